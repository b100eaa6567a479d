pub mod aggregator;
pub mod commands;
pub mod dungeons;
pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod publish;
pub mod standings;
pub mod stats;
pub mod validator;


pub use aggregator::{Aggregation, Aggregator};
pub use commands::{Actor, CommandError, CommandService, TeamCommand, TeamOutcome};
pub use error::EngineError;
pub use lifecycle::RacePhase;
pub use monitor::{MonitorSettings, PassSummary, RaceMonitor};
pub use publish::{LockNotice, Publisher};
pub use standings::{StandingsView, WinnersView};
pub use stats::{StatsClient, StatsError};
pub use validator::{RejectReason, Validator, Verdict};
