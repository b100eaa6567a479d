//! Decides whether one activity report counts as a race completion.
//!
//! Checks run in a fixed order and stop at the first failure:
//! fresh start, player count, missing members, extra players, full-run
//! presence, duplicate entries.

use std::collections::HashSet;
use std::fmt;

use common::MemberName;

use crate::stats::ActivityReport;

/// Default allowed gap between a player's time in activity and the run length.
pub const DEFAULT_PRESENCE_TOLERANCE_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The stats service returned no report for the instance.
    NoReport,
    NotFresh,
    PlayerCountMismatch { in_run: usize, on_team: usize },
    MissingMembers(Vec<MemberName>),
    ExtraPlayers(Vec<String>),
    NotPresentForFullRun { player: String },
    DuplicatePlayers,
}

impl RejectReason {
    /// Stable short code for audit logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoReport => "no report",
            Self::NotFresh => "not fresh",
            Self::PlayerCountMismatch { .. } => "player count mismatch",
            Self::MissingMembers(_) => "missing members",
            Self::ExtraPlayers(_) => "extra players",
            Self::NotPresentForFullRun { .. } => "not present for full run",
            Self::DuplicatePlayers => "duplicate players",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReport => f.write_str("No activity report available"),
            Self::NotFresh => f.write_str("Not a fresh run (checkpoint used)"),
            Self::PlayerCountMismatch { in_run, on_team } => write!(
                f,
                "Player count mismatch: {in_run} in run, {on_team} on team"
            ),
            Self::MissingMembers(m) => write!(f, "Missing team members: {}", m.join(", ")),
            Self::ExtraPlayers(p) => write!(f, "Extra players not on team: {}", p.join(", ")),
            Self::NotPresentForFullRun { player } => {
                write!(f, "{player} was not present for full run")
            }
            Self::DuplicatePlayers => f.write_str("Duplicate players in completion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Human-readable reason, for audit logging.
    pub fn reason(&self) -> String {
        match self {
            Self::Accepted => "Valid completion".to_string(),
            Self::Rejected(r) => r.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    presence_tolerance_secs: u64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_PRESENCE_TOLERANCE_SECS)
    }
}

impl Validator {
    pub fn new(presence_tolerance_secs: u64) -> Self {
        Self {
            presence_tolerance_secs,
        }
    }

    pub fn validate(&self, report: Option<&ActivityReport>, roster: &[MemberName]) -> Verdict {
        let Some(report) = report else {
            return Verdict::Rejected(RejectReason::NoReport);
        };

        if !report.started_from_beginning {
            return Verdict::Rejected(RejectReason::NotFresh);
        }

        // Anonymous entries carry no identity and are ignored.
        let entries: Vec<_> = report
            .entries
            .iter()
            .filter_map(|e| e.player.as_deref().map(|p| (p, e)))
            .collect();

        let participants: HashSet<&str> = entries.iter().map(|(p, _)| *p).collect();

        if participants.len() != roster.len() {
            return Verdict::Rejected(RejectReason::PlayerCountMismatch {
                in_run: participants.len(),
                on_team: roster.len(),
            });
        }

        let missing: Vec<MemberName> = roster
            .iter()
            .filter(|m| !participants.contains(m.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Verdict::Rejected(RejectReason::MissingMembers(missing));
        }

        let mut extra: Vec<String> = Vec::new();
        for (player, _) in &entries {
            if !roster.iter().any(|m| m == player) && !extra.iter().any(|e| e == player) {
                extra.push(player.to_string());
            }
        }
        if !extra.is_empty() {
            return Verdict::Rejected(RejectReason::ExtraPlayers(extra));
        }

        let run_length = entries
            .iter()
            .map(|(_, e)| e.activity_duration_secs)
            .max()
            .unwrap_or(0);
        for (player, entry) in &entries {
            if run_length.abs_diff(entry.time_played_secs) > self.presence_tolerance_secs {
                return Verdict::Rejected(RejectReason::NotPresentForFullRun {
                    player: player.to_string(),
                });
            }
        }

        if entries.len() != participants.len() {
            return Verdict::Rejected(RejectReason::DuplicatePlayers);
        }

        Verdict::Accepted
    }
}
