use async_trait::async_trait;

use super::error::StorageError;
use crate::state::{GuildId, GuildState};

/// Repository of per-guild state.
///
/// Writers follow a read-modify-write discipline: `load`, mutate, `save`.
/// There is no locking; the poll loop is the only scheduled writer and
/// concurrent command handlers are last-writer-wins.
#[async_trait]
pub trait GuildStore: Send + Sync {
    /// Load a guild's state. A guild with nothing stored yields an empty state.
    async fn load(&self, guild: GuildId) -> Result<GuildState, StorageError>;

    /// Replace a guild's stored state.
    async fn save(&self, guild: GuildId, state: &GuildState) -> Result<(), StorageError>;

    /// Guilds that currently have stored state.
    async fn list_guilds(&self) -> Result<Vec<GuildId>, StorageError>;

    /// Load, apply `f`, and save. Returns whatever `f` returns.
    async fn update<F, R>(&self, guild: GuildId, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut GuildState) -> R + Send,
        R: Send,
        Self: Sized,
    {
        let mut state = self.load(guild).await?;
        let out = f(&mut state);
        self.save(guild, &state).await?;
        Ok(out)
    }
}
