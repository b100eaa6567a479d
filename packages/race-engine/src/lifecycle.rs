//! Race phases and the end-of-race freeze.

use chrono::{DateTime, Utc};
use common::{CompletionRecord, FinishStatus, RaceEvent, RaceResults, Team};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    /// `now < start`.
    Pending,
    /// `start <= now <= end`; completions are polled.
    Active,
    /// `now > end` but results are not frozen yet.
    Ended,
    /// Results frozen. The race is removed from the active set.
    Finalized,
}

impl RacePhase {
    /// Phase of `race` at `now`, given its stored results.
    pub fn of(race: &RaceEvent, results: Option<&RaceResults>, now: DateTime<Utc>) -> Self {
        if results.is_some_and(RaceResults::is_finalized) {
            return Self::Finalized;
        }
        if now < race.start_utc() {
            Self::Pending
        } else if now <= race.end_utc() {
            Self::Active
        } else {
            Self::Ended
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for RacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mark DNFs and freeze `results`.
///
/// A team is DNF when it has no statistic, or fewer runs than the scoring
/// mode needs. Teams never polled get a bare DNF record. Returns `false`
/// without touching anything if the results were already frozen.
pub fn finalize_results<'a>(
    race: &RaceEvent,
    teams: impl IntoIterator<Item = &'a Team>,
    results: &mut RaceResults,
    now: DateTime<Utc>,
) -> bool {
    if results.is_finalized() {
        return false;
    }

    let required = race.scoring.required_completions();
    for team in teams {
        let never_timed = match results.get_mut(&team.name) {
            Some(record) if record.time.is_some() => {
                if record.completions < required {
                    record.status = Some(FinishStatus::Dnf);
                }
                false
            }
            _ => true,
        };
        if never_timed {
            results.upsert(&team.name, CompletionRecord::dnf());
        }
    }

    results.finalized_at = Some(now);
    true
}
