pub mod catalog;
pub mod config;
pub mod level_config;
pub mod outcome;
pub mod player;
pub mod poll;
pub mod vote;

pub use catalog::{Catalog, CatalogLevel, CatalogOption, CatalogPoll, CatalogRecords, CatalogStage};
pub use config::{Config, DatabaseConfig, LoggingConfig, ScoringConfig};
pub use level_config::{LevelConfig, StageConfig, TierEntry};
pub use outcome::{
    CompletionKind, CompletionPayload, CompletionState, ConsensusBreakdown, ConsensusCount,
    MetricsSnapshot, SettlementOutcome, TierAward,
};
pub use player::{GrantKey, GuestSession, HistoryEntry, Player, Position};
pub use poll::{PairingEntry, PairingMatrix, Poll, PollKind, PollOption, Side};
pub use vote::{Ballot, Vote};
