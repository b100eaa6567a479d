pub mod bungie;
pub mod config;
pub mod error;
pub mod publisher;
pub mod scheduler;

pub use bungie::BungieClient;
pub use config::WorkerAppConfig;
pub use error::{Result, WorkerError};
pub use publisher::FilePublisher;
