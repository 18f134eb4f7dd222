//! Veer - bias-awareness game engine
//!
//! Veer is the progression and scoring engine behind a gamified
//! assessment: players answer polls, each ballot is judged and scored
//! immediately, and covering a level unlocks the path to the next one.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Poll, ballot, and player models with their ports
//! - **Service Layer** (`services`): Settlement, completion, and progression logic
//! - **Adapters Layer** (`adapters`): SQLite persistence and guest sessions
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use veer::services::SettlementService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire repositories and settle ballots
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Ballot, Config, DatabaseConfig, LoggingConfig, Player, Poll, PollKind, PollOption, Position,
    ScoringConfig, SettlementOutcome, Side, Vote,
};
pub use domain::ports::{
    ConfigRepository, PlayerRepository, PollRepository, ProgressStore, VoteRepository,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{LevelCompletionService, SettlementService, TierClassifier};
