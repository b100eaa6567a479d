//! Publishes rendered views as Markdown files, one directory per guild.
//!
//! Layout under the publish root:
//! - `{guild}/leaderboard-{race-slug}-{digest}.md`, replaced on every update
//! - `{guild}/winners-circle.md`, appended once per concluded race
//! - `{guild}/channel-locks.md`, one line per locked team channel

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use common::{GuildId, Team};
use dashmap::DashMap;
use race_engine::error::{EngineError, Result};
use race_engine::publish::{LockNotice, Publisher};
use race_engine::standings::{StandingsView, WinnersView};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// File stem for a race's leaderboard. The digest of the exact name keeps
/// names that slug alike apart.
fn leaderboard_stem(race: &str) -> String {
    let digest = hex::encode(&Sha256::digest(race.as_bytes())[..4]);
    match slug(race) {
        s if s.is_empty() => format!("leaderboard-{digest}"),
        s => format!("leaderboard-{s}-{digest}"),
    }
}

fn publish_err(e: std::io::Error) -> EngineError {
    EngineError::Publish(e.to_string())
}

pub struct FilePublisher {
    root: PathBuf,
    /// Last leaderboard body written per guild and race; unchanged views are not rewritten.
    leaderboards: DashMap<(GuildId, String), String>,
}

impl FilePublisher {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            leaderboards: DashMap::new(),
        }
    }

    fn guild_dir(&self, guild: GuildId) -> PathBuf {
        self.root.join(guild.to_string())
    }

    fn leaderboard_path(&self, guild: GuildId, race: &str) -> PathBuf {
        self.guild_dir(guild)
            .join(format!("{}.md", leaderboard_stem(race)))
    }

    async fn write_atomic(&self, path: &Path, body: &str) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| EngineError::Publish(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir).await.map_err(publish_err)?;

        let temp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&temp, body).await {
            let _ = fs::remove_file(&temp).await;
            return Err(publish_err(e));
        }
        fs::rename(&temp, path).await.map_err(publish_err)
    }

    async fn append(&self, path: &Path, body: &str) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(publish_err)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(publish_err)?;
        file.write_all(body.as_bytes()).await.map_err(publish_err)?;
        file.flush().await.map_err(publish_err)
    }
}

#[async_trait]
impl Publisher for FilePublisher {
    async fn publish_leaderboard(&self, guild: GuildId, view: &StandingsView) -> Result<()> {
        let body = view.render();
        let key = (guild, view.race.clone());
        if self.leaderboards.get(&key).is_some_and(|prev| *prev == body) {
            debug!(guild_id = guild, race = %view.race, "Leaderboard unchanged");
            return Ok(());
        }

        let path = self.leaderboard_path(guild, &view.race);
        self.write_atomic(&path, &body).await?;
        self.leaderboards.insert(key, body);
        info!(guild_id = guild, race = %view.race, path = %path.display(), "Leaderboard published");
        Ok(())
    }

    async fn remove_leaderboard(&self, guild: GuildId, race: &str) -> Result<()> {
        self.leaderboards.remove(&(guild, race.to_string()));
        let path = self.leaderboard_path(guild, race);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(guild_id = guild, race, "Leaderboard removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(publish_err(e)),
        }
    }

    async fn publish_winners(&self, guild: GuildId, view: &WinnersView) -> Result<()> {
        let path = self.guild_dir(guild).join("winners-circle.md");
        self.append(&path, &format!("{}\n", view.render())).await?;
        info!(guild_id = guild, race = %view.race, podium = view.podium.len(), "Winners published");
        Ok(())
    }

    async fn lock_team_channel(
        &self,
        guild: GuildId,
        team: &Team,
        notice: &LockNotice,
    ) -> Result<()> {
        let path = self.guild_dir(guild).join("channel-locks.md");
        let line = format!("#{}: {}\n", team.channel_slug(), notice.message());
        self.append(&path, &line).await?;
        info!(
            guild_id = guild,
            team = %team.name,
            channel = ?team.channels.text_channel_id,
            grace_days = notice.grace_days,
            "Team channel locked"
        );
        Ok(())
    }
}
