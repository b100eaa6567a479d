//! The poll pass: one sweep over every race in a guild.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::storage::GuildStore;
use common::{GuildId, GuildState, RaceEvent, Team};
use tracing::{debug, error, info, warn};

use crate::aggregator::{Aggregation, Aggregator};
use crate::error::{EngineError, Result};
use crate::lifecycle::{RacePhase, finalize_results};
use crate::publish::{LockNotice, Publisher};
use crate::standings::{project, winners};
use crate::stats::{FetchOptions, StatsClient, fetch_completions};
use crate::validator::{DEFAULT_PRESENCE_TOLERANCE_SECS, Validator};

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub fetch: FetchOptions,
    pub presence_tolerance_secs: u64,
    pub lock_grace_days: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            presence_tolerance_secs: DEFAULT_PRESENCE_TOLERANCE_SECS,
            lock_grace_days: 2,
        }
    }
}

/// Counters for one pass, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pending: usize,
    pub polled: usize,
    pub concluded: usize,
    pub teams_updated: usize,
    pub team_failures: usize,
    pub race_failures: usize,
}

pub struct RaceMonitor {
    store: Arc<dyn GuildStore>,
    stats: Arc<dyn StatsClient>,
    publisher: Arc<dyn Publisher>,
    settings: MonitorSettings,
}

impl RaceMonitor {
    pub fn new(
        store: Arc<dyn GuildStore>,
        stats: Arc<dyn StatsClient>,
        publisher: Arc<dyn Publisher>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            stats,
            publisher,
            settings,
        }
    }

    pub async fn check_race_completions(&self, guild: GuildId) -> Result<PassSummary> {
        self.check_race_completions_at(guild, Utc::now()).await
    }

    /// Run one full pass for `guild` as of `now`.
    ///
    /// Failures are isolated per race and per team; only failing to load
    /// the guild's state aborts the pass.
    pub async fn check_race_completions_at(
        &self,
        guild: GuildId,
        now: DateTime<Utc>,
    ) -> Result<PassSummary> {
        let mut state = self.store.load(guild).await?;
        let mut summary = PassSummary::default();

        info!(guild_id = guild, races = state.races.len(), "Starting completion check");

        let races = state.races.clone();
        for race in &races {
            let phase = RacePhase::of(race, state.results.get(&race.results_key()), now);
            debug!(guild_id = guild, race = %race.name, %phase, "Race phase");

            let outcome = match phase {
                RacePhase::Pending => {
                    summary.pending += 1;
                    continue;
                }
                RacePhase::Active => {
                    let result = self.poll_race(guild, &mut state, race, &mut summary).await;
                    if result.is_ok() {
                        summary.polled += 1;
                    }
                    result
                }
                RacePhase::Ended | RacePhase::Finalized => {
                    let result = self.conclude_race(guild, &mut state, race, now).await;
                    if result.is_ok() {
                        summary.concluded += 1;
                    }
                    result
                }
            };

            if let Err(e) = outcome {
                summary.race_failures += 1;
                error!(guild_id = guild, race = %race.name, error = %e, "Race processing failed");
            }
        }

        info!(
            guild_id = guild,
            polled = summary.polled,
            concluded = summary.concluded,
            pending = summary.pending,
            teams_updated = summary.teams_updated,
            team_failures = summary.team_failures,
            "Completion check finished"
        );
        Ok(summary)
    }

    async fn poll_race(
        &self,
        guild: GuildId,
        state: &mut GuildState,
        race: &RaceEvent,
        summary: &mut PassSummary,
    ) -> Result<()> {
        if race.end_utc() < race.start_utc() {
            return Err(EngineError::DataIntegrity(format!(
                "race '{}' ends before it starts",
                race.name
            )));
        }

        let key = race.results_key();
        let teams: Vec<Team> = state.teams_in_race(&race.name).cloned().collect();

        for team in &teams {
            let previous = state.results.get(&key).and_then(|r| r.get(&team.name));

            match self.poll_team(race, team, previous).await {
                Ok(agg) => {
                    if agg.accepted > 0 {
                        info!(
                            guild_id = guild,
                            race = %race.name,
                            team = %team.name,
                            accepted = agg.accepted,
                            time = ?agg.record.time,
                            "New completions recorded"
                        );
                    }
                    state
                        .results
                        .entry(key.clone())
                        .or_default()
                        .upsert(&team.name, agg.record);
                    self.store.save(guild, state).await?;
                    summary.teams_updated += 1;
                }
                Err(EngineError::DataIntegrity(reason)) => {
                    summary.team_failures += 1;
                    warn!(guild_id = guild, team = %team.name, %reason, "Skipping team");
                }
                Err(e) => {
                    summary.team_failures += 1;
                    error!(guild_id = guild, team = %team.name, error = %e, "Failed to check team completions");
                }
            }
        }

        if let Some(results) = state.results.get(&key) {
            let view = project(race, results);
            if let Err(e) = self.publisher.publish_leaderboard(guild, &view).await {
                warn!(guild_id = guild, race = %race.name, error = %e, "Failed to publish leaderboard");
            }
        }
        Ok(())
    }

    async fn poll_team(
        &self,
        race: &RaceEvent,
        team: &Team,
        previous: Option<&common::CompletionRecord>,
    ) -> Result<Aggregation> {
        if team.members.is_empty() {
            return Err(EngineError::DataIntegrity(format!(
                "team '{}' has no roster",
                team.name
            )));
        }
        let captain = if team.captain.is_empty() {
            &team.members[0]
        } else {
            &team.captain
        };

        let candidates = fetch_completions(
            self.stats.as_ref(),
            captain,
            race.dungeon_hash,
            race.start_utc(),
            race.end_utc(),
            self.settings.fetch,
        )
        .await?;

        let validator = Validator::new(self.settings.presence_tolerance_secs);
        let agg = Aggregator::new(self.stats.as_ref(), validator)
            .aggregate(&team.name, &team.members, previous, &candidates, race.scoring)
            .await?;
        Ok(agg)
    }

    /// Freeze results, announce winners, lock channels, retire the race.
    ///
    /// Safe to re-enter: frozen results are left alone and a race that
    /// is already gone is not an error.
    async fn conclude_race(
        &self,
        guild: GuildId,
        state: &mut GuildState,
        race: &RaceEvent,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key = race.results_key();
        let teams: Vec<Team> = state.teams_in_race(&race.name).cloned().collect();

        let results = state.results.entry(key).or_default();
        if finalize_results(race, &teams, results, now) {
            info!(guild_id = guild, race = %race.name, teams = teams.len(), "Race results finalized");
        }
        let results = results.clone();
        self.store.save(guild, state).await?;

        match winners(race, &results, &teams) {
            Some(view) => {
                if let Err(e) = self.publisher.publish_winners(guild, &view).await {
                    error!(guild_id = guild, race = %race.name, error = %e, "Failed to publish winners");
                }
            }
            None => info!(guild_id = guild, race = %race.name, "Race ended with no finishers"),
        }

        let notice = LockNotice {
            race: race.name.clone(),
            grace_days: self.settings.lock_grace_days,
        };
        for team in &teams {
            if let Err(e) = self.publisher.lock_team_channel(guild, team, &notice).await {
                warn!(guild_id = guild, team = %team.name, error = %e, "Failed to lock team channel");
            }
        }

        if state.remove_race(&race.name) {
            self.store.save(guild, state).await?;
            info!(guild_id = guild, race = %race.name, "Race removed from active set");
        } else {
            debug!(guild_id = guild, race = %race.name, "Race already removed");
        }
        Ok(())
    }
}
