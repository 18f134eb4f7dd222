use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Poll;

/// Repository port for poll content persistence.
///
/// Polls and their options are written by the catalog importer and read by
/// every settlement and resolution path.
#[async_trait]
pub trait PollRepository: Send + Sync {
    /// Upsert a poll and its options, keyed by (stage, level, order).
    async fn store(&self, poll: &Poll) -> DomainResult<()>;

    /// Get a poll with its options by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Poll>>;

    /// Get a poll with its options by position.
    async fn get_by_position(&self, stage: u32, level: u32, ordinal: u32)
        -> DomainResult<Option<Poll>>;

    /// List a level's polls ordered by their position within the level.
    async fn list_level(&self, stage: u32, level: u32) -> DomainResult<Vec<Poll>>;

    /// Distinct levels that have polls in a stage, ascending.
    async fn levels_in_stage(&self, stage: u32) -> DomainResult<Vec<u32>>;

    /// Distinct stages that have polls, ascending.
    async fn stages(&self) -> DomainResult<Vec<u32>>;
}
