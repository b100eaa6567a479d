use common::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("bungie.api_key is not set")]
    MissingApiKey,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for WorkerError {
    fn from(e: reqwest::Error) -> Self {
        WorkerError::Http(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
