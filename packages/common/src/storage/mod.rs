mod error;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemGuildStore;
pub use traits::GuildStore;
