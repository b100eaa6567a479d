pub mod config;
pub mod race;
pub mod results;
pub mod state;
pub mod storage;
pub mod team;

pub use race::{RaceEvent, ScoringMode};
pub use results::{CompletionRecord, FinishStatus, RaceResults, TeamResult};
pub use state::{GuildId, GuildState};
pub use team::{MemberName, Team};
