use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use ::common::storage::{FilesystemGuildStore, GuildStore};
use ::common::{GuildId, GuildState, RaceEvent, ScoringMode, Team};
use race_engine::error::Result as EngineResult;
use race_engine::monitor::{MonitorSettings, RaceMonitor};
use race_engine::publish::{LockNotice, Publisher};
use race_engine::standings::{StandingsView, WinnersView};
use race_engine::stats::{
    ActivityReport, ActivitySummary, BungieName, Membership, ReportEntry, StatsClient, StatsError,
};

pub const GUILD: GuildId = 4242;
pub const DUNGEON: u64 = 2823159265;
pub const RACE: &str = "Duality Dash";

/// Race start used by every scenario.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

pub fn race(scoring: ScoringMode) -> RaceEvent {
    RaceEvent {
        name: RACE.into(),
        dungeon_name: "Duality".into(),
        dungeon_hash: DUNGEON,
        start: t0().fixed_offset(),
        end: (t0() + Duration::seconds(3600)).fixed_offset(),
        scoring,
    }
}

pub fn team(name: &str, members: &[&str]) -> Team {
    Team::new(name, RACE, members.iter().map(|m| m.to_string()).collect())
}

/// A completed run of the race dungeon `minutes` after the start.
pub fn run(instance_id: &str, minutes: i64, duration_secs: u64) -> ActivitySummary {
    ActivitySummary {
        reference_id: DUNGEON,
        instance_id: instance_id.into(),
        period: t0() + Duration::minutes(minutes),
        completed: true,
        duration_secs,
    }
}

pub fn fresh_report(instance_id: &str, players: &[&str], duration: u64) -> ActivityReport {
    ActivityReport {
        instance_id: instance_id.into(),
        started_from_beginning: true,
        entries: players
            .iter()
            .map(|p| ReportEntry {
                player: Some(p.to_string()),
                time_played_secs: duration,
                activity_duration_secs: duration,
            })
            .collect(),
    }
}

/// In-memory stats service whose data can change between passes.
#[derive(Default)]
pub struct FakeStats {
    histories: Mutex<HashMap<String, Vec<ActivitySummary>>>,
    reports: Mutex<HashMap<String, ActivityReport>>,
    failing_reports: Mutex<HashSet<String>>,
    report_calls: Mutex<Vec<String>>,
}

impl FakeStats {
    /// Record a completed run in `player`'s history along with its report.
    /// Newest runs go first, as the real service lists them.
    pub fn add_run(&self, player: &str, summary: ActivitySummary, report: ActivityReport) {
        let mut histories = self.histories.lock().unwrap();
        let history = histories.entry(player.to_string()).or_default();
        history.push(summary);
        history.sort_by(|a, b| b.period.cmp(&a.period));
        self.reports
            .lock()
            .unwrap()
            .insert(report.instance_id.clone(), report);
    }

    pub fn fail_report(&self, instance_id: &str) {
        self.failing_reports
            .lock()
            .unwrap()
            .insert(instance_id.to_string());
    }

    pub fn report_calls(&self) -> Vec<String> {
        self.report_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatsClient for FakeStats {
    async fn search_player(&self, name: &BungieName) -> Result<Membership, StatsError> {
        Ok(Membership {
            membership_type: 3,
            membership_id: format!("{}#{:04}", name.display_name, name.code),
        })
    }

    async fn list_characters(&self, membership: &Membership) -> Result<Vec<String>, StatsError> {
        // One character per player, named after the player.
        Ok(vec![membership.membership_id.clone()])
    }

    async fn list_recent_activities(
        &self,
        _membership: &Membership,
        character_id: &str,
        _activity_mode: u32,
        page: u32,
    ) -> Result<Vec<ActivitySummary>, StatsError> {
        if page > 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(character_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_full_report(
        &self,
        instance_id: &str,
    ) -> Result<Option<ActivityReport>, StatsError> {
        self.report_calls
            .lock()
            .unwrap()
            .push(instance_id.to_string());
        if self.failing_reports.lock().unwrap().contains(instance_id) {
            return Err(StatsError::Http { status: 500 });
        }
        Ok(self.reports.lock().unwrap().get(instance_id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Leaderboard(StandingsView),
    Removed(String),
    Winners(WinnersView),
    Locked { team: String, message: String },
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Published>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<Published> {
        self.events.lock().unwrap().clone()
    }

    pub fn leaderboards(&self) -> Vec<StandingsView> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Published::Leaderboard(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn winners(&self) -> Vec<WinnersView> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Published::Winners(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn locked_teams(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Published::Locked { team, .. } => Some(team),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_leaderboard(&self, _guild: GuildId, view: &StandingsView) -> EngineResult<()> {
        self.events
            .lock()
            .unwrap()
            .push(Published::Leaderboard(view.clone()));
        Ok(())
    }

    async fn remove_leaderboard(&self, _guild: GuildId, race: &str) -> EngineResult<()> {
        self.events
            .lock()
            .unwrap()
            .push(Published::Removed(race.to_string()));
        Ok(())
    }

    async fn publish_winners(&self, _guild: GuildId, view: &WinnersView) -> EngineResult<()> {
        self.events
            .lock()
            .unwrap()
            .push(Published::Winners(view.clone()));
        Ok(())
    }

    async fn lock_team_channel(
        &self,
        _guild: GuildId,
        team: &Team,
        notice: &LockNotice,
    ) -> EngineResult<()> {
        self.events.lock().unwrap().push(Published::Locked {
            team: team.name.clone(),
            message: notice.message(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<FilesystemGuildStore>,
    pub stats: Arc<FakeStats>,
    pub publisher: Arc<RecordingPublisher>,
    pub monitor: RaceMonitor,
    _dir: TempDir,
}

impl TestApp {
    pub async fn with_state(state: GuildState) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            FilesystemGuildStore::new(dir.path().join("guilds"))
                .await
                .expect("Failed to create store"),
        );
        store.save(GUILD, &state).await.expect("Failed to seed state");

        let stats = Arc::new(FakeStats::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let monitor = RaceMonitor::new(
            store.clone(),
            stats.clone(),
            publisher.clone(),
            MonitorSettings::default(),
        );

        Self {
            store,
            stats,
            publisher,
            monitor,
            _dir: dir,
        }
    }

    pub async fn state(&self) -> GuildState {
        self.store.load(GUILD).await.expect("Failed to load state")
    }

    pub async fn edit(&self, f: impl FnOnce(&mut GuildState) + Send) {
        self.store.update(GUILD, f).await.expect("Failed to update state");
    }

    /// Run a pass `minutes` after the race start.
    pub async fn pass_at(&self, minutes: i64) -> race_engine::PassSummary {
        self.monitor
            .check_race_completions_at(GUILD, t0() + Duration::minutes(minutes))
            .await
            .expect("Pass failed")
    }
}
