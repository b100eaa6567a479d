use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::team::MemberName;

/// Number of valid run durations kept in storage.
pub const STORED_TIMES: usize = 10;

/// Terminal status assigned at race end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinishStatus {
    /// Did not finish: no statistic, or too few runs for the scoring mode.
    Dnf,
}

/// Accumulated completions for one team in one race.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Scoring statistic in seconds; `None` until a run is accepted.
    pub time: Option<f64>,
    /// Number of accepted runs.
    pub completions: usize,
    /// Fastest accepted durations in seconds, ascending, at most [`STORED_TIMES`].
    #[serde(default)]
    pub all_times: Vec<u64>,
    /// Instance ids accepted for this roster.
    #[serde(default)]
    pub processed_instances: BTreeSet<String>,
    /// Roster in effect when `processed_instances` were accepted.
    #[serde(default)]
    pub team_members: Vec<MemberName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FinishStatus>,
}

impl CompletionRecord {
    /// Record for a team that never produced a valid run.
    pub fn dnf() -> Self {
        Self {
            status: Some(FinishStatus::Dnf),
            ..Default::default()
        }
    }

    pub fn is_dnf(&self) -> bool {
        self.status == Some(FinishStatus::Dnf)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamResult {
    pub team: String,
    pub record: CompletionRecord,
}

/// Per-team results for one race, in the order teams were first polled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceResults {
    /// Set once the race has concluded; the entries are frozen from then on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: Vec<TeamResult>,
}

impl RaceResults {
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn get(&self, team: &str) -> Option<&CompletionRecord> {
        self.entries
            .iter()
            .find(|e| e.team == team)
            .map(|e| &e.record)
    }

    pub fn get_mut(&mut self, team: &str) -> Option<&mut CompletionRecord> {
        self.entries
            .iter_mut()
            .find(|e| e.team == team)
            .map(|e| &mut e.record)
    }

    /// Insert or replace a team's record, keeping its position on replace.
    pub fn upsert(&mut self, team: &str, record: CompletionRecord) {
        match self.get_mut(team) {
            Some(existing) => *existing = record,
            None => self.entries.push(TeamResult {
                team: team.to_string(),
                record,
            }),
        }
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        for entry in self.entries.iter_mut().filter(|e| e.team == from) {
            entry.team = to.to_string();
        }
    }

    pub fn remove(&mut self, team: &str) {
        self.entries.retain(|e| e.team != team);
    }
}
