//! Folds newly validated completions into a team's [`CompletionRecord`].

use std::collections::BTreeSet;

use common::results::STORED_TIMES;
use common::{CompletionRecord, MemberName, ScoringMode};
use tracing::{debug, info};

use crate::stats::{Candidate, StatsClient, StatsError};
use crate::validator::Validator;

/// Runs needed for the average statistic to be complete.
const AVERAGE_OF: usize = 3;

/// Result of one aggregation pass for one team.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub record: CompletionRecord,
    pub roster_changed: bool,
    /// Candidates whose reports were fetched and validated this pass.
    pub checked: usize,
    pub accepted: usize,
}

/// Whether `current` differs from the stored roster snapshot.
///
/// Order is ignored. An empty snapshot (nothing accepted yet) never counts
/// as a change.
pub fn roster_changed(current: &[MemberName], snapshot: &[MemberName]) -> bool {
    if snapshot.is_empty() {
        return false;
    }
    let mut a: Vec<&str> = current.iter().map(String::as_str).collect();
    let mut b: Vec<&str> = snapshot.iter().map(String::as_str).collect();
    a.sort_unstable();
    b.sort_unstable();
    a != b
}

/// Scoring statistic over ascending `times`.
///
/// `Best` takes the fastest run. `Average` takes the mean of the three
/// fastest, or of however many exist when fewer than three.
pub fn statistic(times: &[u64], mode: ScoringMode) -> Option<f64> {
    if times.is_empty() {
        return None;
    }
    match mode {
        ScoringMode::Best => times.iter().min().map(|&t| t as f64),
        ScoringMode::Average => {
            let take = times.len().min(AVERAGE_OF);
            let sum: u64 = times[..take].iter().sum();
            Some(sum as f64 / take as f64)
        }
    }
}

pub struct Aggregator<'a> {
    stats: &'a dyn StatsClient,
    validator: Validator,
}

impl<'a> Aggregator<'a> {
    pub fn new(stats: &'a dyn StatsClient, validator: Validator) -> Self {
        Self { stats, validator }
    }

    /// Validate unseen candidates against `roster` and merge them into `previous`.
    ///
    /// A roster change discards the stored instances and times, so every
    /// candidate is validated again against the new roster. Any report
    /// fetch failure aborts the pass for this team and leaves `previous`
    /// untouched.
    pub async fn aggregate(
        &self,
        team: &str,
        roster: &[MemberName],
        previous: Option<&CompletionRecord>,
        candidates: &[Candidate],
        mode: ScoringMode,
    ) -> Result<Aggregation, StatsError> {
        let snapshot = previous.map(|p| p.team_members.as_slice()).unwrap_or(&[]);
        let changed = roster_changed(roster, snapshot);

        let (mut processed, mut times): (BTreeSet<String>, Vec<u64>) = match previous {
            Some(p) if !changed => (p.processed_instances.clone(), p.all_times.clone()),
            _ => (BTreeSet::new(), Vec::new()),
        };

        if changed {
            info!(
                team,
                old = ?snapshot,
                new = ?roster,
                "Roster changed, re-validating every completion"
            );
        }

        let mut checked = 0;
        let mut accepted = 0;

        for candidate in candidates {
            if processed.contains(&candidate.instance_id) {
                continue;
            }

            let report = self.stats.get_full_report(&candidate.instance_id).await?;
            let verdict = self.validator.validate(report.as_ref(), roster);
            checked += 1;

            if verdict.is_accepted() {
                debug!(team, instance_id = %candidate.instance_id, duration_secs = candidate.duration_secs, "Completion accepted");
                times.push(candidate.duration_secs);
                processed.insert(candidate.instance_id.clone());
                accepted += 1;
            } else {
                info!(
                    team,
                    instance_id = %candidate.instance_id,
                    reason = %verdict.reason(),
                    "Completion rejected"
                );
            }
        }

        times.sort_unstable();
        let time = statistic(&times, mode);
        times.truncate(STORED_TIMES);

        let record = CompletionRecord {
            time,
            completions: processed.len(),
            all_times: times,
            processed_instances: processed,
            team_members: roster.to_vec(),
            status: None,
        };

        Ok(Aggregation {
            record,
            roster_changed: changed,
            checked,
            accepted,
        })
    }
}
