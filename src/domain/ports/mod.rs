//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - PollRepository: poll content persistence
//! - VoteRepository: durable vote persistence and tallies
//! - PlayerRepository: durable identities and completion grants
//! - ConfigRepository: imported level/stage configuration
//! - ProgressStore: one identity's progress, durable or guest
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod config_repository;
pub mod player_repository;
pub mod poll_repository;
pub mod progress_store;
pub mod vote_repository;

pub use config_repository::ConfigRepository;
pub use player_repository::PlayerRepository;
pub use poll_repository::PollRepository;
pub use progress_store::{ConsensusSettlement, ProgressStore};
pub use vote_repository::VoteRepository;
