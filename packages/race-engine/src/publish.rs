use async_trait::async_trait;
use common::{GuildId, Team};

use crate::error::Result;
use crate::standings::{StandingsView, WinnersView};

/// Notice posted to a team channel when its race ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockNotice {
    pub race: String,
    /// Days until the channel is deleted by the chat surface.
    pub grace_days: u32,
}

impl LockNotice {
    pub fn message(&self) -> String {
        format!(
            "**{}** has ended. This channel has been locked and will be deleted in {} days.",
            self.race, self.grace_days
        )
    }
}

/// Where standings and race-end side effects go.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Replace the published view for `view.race`, or publish it if none exists.
    async fn publish_leaderboard(&self, guild: GuildId, view: &StandingsView) -> Result<()>;

    /// Remove the published view for `race`, if any.
    async fn remove_leaderboard(&self, guild: GuildId, race: &str) -> Result<()>;

    async fn publish_winners(&self, guild: GuildId, view: &WinnersView) -> Result<()>;

    /// Revoke write access on the team's text channel (reads stay open) and post `notice`.
    async fn lock_team_channel(&self, guild: GuildId, team: &Team, notice: &LockNotice)
    -> Result<()>;
}
