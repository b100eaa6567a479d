use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a team's valid runs are reduced to a single ranking time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Fastest single run.
    Best,
    /// Mean of the three fastest runs.
    Average,
}

impl ScoringMode {
    /// All possible scoring modes.
    pub const ALL: &'static [ScoringMode] = &[Self::Best, Self::Average];

    /// Number of runs a team needs to avoid a DNF at race end.
    pub fn required_completions(&self) -> usize {
        match self {
            Self::Best => 1,
            Self::Average => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Average => "average",
        }
    }

    /// Capitalised label used in rendered views.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Best => "Best",
            Self::Average => "Average",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid scoring mode string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseScoringModeError {
    invalid: String,
}

impl fmt::Display for ParseScoringModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid scoring mode '{}'. Valid values: {}",
            self.invalid,
            ScoringMode::ALL
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseScoringModeError {}

impl FromStr for ScoringMode {
    type Err = ParseScoringModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(Self::Best),
            "average" => Ok(Self::Average),
            _ => Err(ParseScoringModeError {
                invalid: s.to_string(),
            }),
        }
    }
}

/// A time-boxed competition on one dungeon. Identified by its name within a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    pub name: String,
    pub dungeon_name: String,
    /// Activity reference hash reported by the stats service.
    pub dungeon_hash: u64,
    /// Start instant, stored with the offset it was entered in.
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub scoring: ScoringMode,
}

impl RaceEvent {
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }

    /// Key under which this race's results are persisted: `{name}_{YYYYMMDD of end}`.
    pub fn results_key(&self) -> String {
        format!("{}_{}", self.name, self.end.format("%Y%m%d"))
    }
}
