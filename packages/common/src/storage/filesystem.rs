use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::error::StorageError;
use super::traits::GuildStore;
use crate::state::{GuildId, GuildState};

/// Filesystem-backed guild store.
///
/// Each guild is one pretty-printed JSON document at `{base_path}/{guild_id}.json`.
/// Writes land in `{base_path}/.tmp` first and are renamed into place.
pub struct FilesystemGuildStore {
    base_path: PathBuf,
}

impl FilesystemGuildStore {
    /// Create a new store, creating the directory layout if needed.
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        if base_path.exists() && !base_path.is_dir() {
            return Err(StorageError::InvalidRoot(base_path.display().to_string()));
        }
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self { base_path })
    }

    fn guild_path(&self, guild: GuildId) -> PathBuf {
        self.base_path.join(format!("{guild}.json"))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl GuildStore for FilesystemGuildStore {
    async fn load(&self, guild: GuildId) -> Result<GuildState, StorageError> {
        let path = self.guild_path(guild);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GuildState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, guild: GuildId, state: &GuildState) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(state)?;
        let temp_path = self.temp_path();

        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, self.guild_path(guild)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(guild_id = guild, bytes = data.len(), "Saved guild state");
        Ok(())
    }

    async fn list_guilds(&self) -> Result<Vec<GuildId>, StorageError> {
        let mut guilds = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<GuildId>().ok())
            {
                guilds.push(id);
            }
        }

        guilds.sort_unstable();
        Ok(guilds)
    }
}
