use common::storage::StorageError;
use thiserror::Error;

use crate::stats::StatsError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Stats service error: {0}")]
    Remote(#[from] StatsError),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Publish error: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
