//! Capability surface of the game-stats service.
//!
//! The engine never speaks HTTP itself; it consumes a [`StatsClient`] and
//! turns the captain's activity history into race [`Candidate`]s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Player not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from stats service")]
    Http { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Stats service error {code}: {message}")]
    Api { code: i64, message: String },
}

/// A `Name#1234` player name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BungieName {
    pub display_name: String,
    pub code: u16,
}

impl BungieName {
    /// Parse `Name#1234`. Names without a numeric `#` suffix are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, code) = raw.rsplit_once('#')?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            display_name: name.to_string(),
            code: code.trim().parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub membership_type: i32,
    pub membership_id: String,
}

/// One row of a character's activity history.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub reference_id: u64,
    pub instance_id: String,
    pub period: DateTime<Utc>,
    pub completed: bool,
    pub duration_secs: u64,
}

/// One participant line of a full activity report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    /// `Name#1234`, or `None` when the service withheld the name.
    pub player: Option<String>,
    pub time_played_secs: u64,
    pub activity_duration_secs: u64,
}

/// Full per-instance activity report.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityReport {
    pub instance_id: String,
    pub started_from_beginning: bool,
    pub entries: Vec<ReportEntry>,
}

#[async_trait]
pub trait StatsClient: Send + Sync {
    async fn search_player(&self, name: &BungieName) -> Result<Membership, StatsError>;

    async fn list_characters(&self, membership: &Membership) -> Result<Vec<String>, StatsError>;

    /// Activities newest first.
    async fn list_recent_activities(
        &self,
        membership: &Membership,
        character_id: &str,
        activity_mode: u32,
        page: u32,
    ) -> Result<Vec<ActivitySummary>, StatsError>;

    /// `Ok(None)` when the service has no report for the instance.
    async fn get_full_report(&self, instance_id: &str)
    -> Result<Option<ActivityReport>, StatsError>;
}

/// A completed run of the race dungeon inside the race window.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub instance_id: String,
    pub period: DateTime<Utc>,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub activity_mode: u32,
    pub max_pages: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            activity_mode: 82,
            max_pages: 1,
        }
    }
}

/// Collect the player's completions of `dungeon_hash` within `[start, end]`.
///
/// A name that does not parse or does not resolve yields no candidates.
/// A failing history listing for one character is skipped; other failures
/// propagate.
pub async fn fetch_completions(
    client: &dyn StatsClient,
    player: &str,
    dungeon_hash: u64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    opts: FetchOptions,
) -> Result<Vec<Candidate>, StatsError> {
    let Some(name) = BungieName::parse(player) else {
        warn!(player, "Player name is not in Name#1234 form, no completions fetched");
        return Ok(Vec::new());
    };

    let membership = match client.search_player(&name).await {
        Ok(m) => m,
        Err(StatsError::NotFound(_)) => {
            warn!(player, "Player not found on stats service");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let characters = client.list_characters(&membership).await?;
    let mut candidates: Vec<Candidate> = Vec::new();

    for character_id in &characters {
        'pages: for page in 0..opts.max_pages {
            let activities = match client
                .list_recent_activities(&membership, character_id, opts.activity_mode, page)
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    warn!(player, character_id = %character_id, page, error = %e, "Failed to list activities");
                    break;
                }
            };

            if activities.is_empty() {
                break;
            }

            for activity in activities {
                if activity.reference_id != dungeon_hash {
                    continue;
                }
                // Listings are newest first; everything after this predates the race.
                if activity.period < start {
                    break 'pages;
                }
                if activity.period > end || !activity.completed {
                    continue;
                }
                if candidates.iter().any(|c| c.instance_id == activity.instance_id) {
                    continue;
                }
                candidates.push(Candidate {
                    instance_id: activity.instance_id,
                    period: activity.period,
                    duration_secs: activity.duration_secs,
                });
            }
        }
    }

    debug!(player, characters = characters.len(), found = candidates.len(), "Fetched completions");
    Ok(candidates)
}
