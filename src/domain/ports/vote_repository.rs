use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConsensusCount, HistoryEntry, Vote};

/// Repository port for durable vote persistence.
///
/// Settlement writes are transactional: replacing a poll's rows and applying
/// the score delta commit together or not at all.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Rows currently recorded for one (player, poll).
    async fn rows_for_poll(&self, player_id: Uuid, poll_id: Uuid) -> DomainResult<Vec<Vote>>;

    /// Replace the rows for (player, poll) with `rows` and credit the score
    /// delta, atomically. Returns the player's new running total.
    async fn settle(
        &self,
        player_id: Uuid,
        poll_id: Uuid,
        rows: &[Vote],
        score_delta: i64,
    ) -> DomainResult<i64>;

    /// Current per-option tally for a consensus poll, all players included.
    async fn tally(&self, poll_id: Uuid) -> DomainResult<Vec<ConsensusCount>>;

    /// All settled rows for a player joined with poll positions, in
    /// settlement order.
    async fn history(&self, player_id: Uuid) -> DomainResult<Vec<HistoryEntry>>;

    /// Settled rows within one level, in position order.
    async fn level_history(
        &self,
        player_id: Uuid,
        stage: u32,
        level: u32,
    ) -> DomainResult<Vec<HistoryEntry>>;

    /// Rows recorded for the poll at one position, if any.
    async fn rows_at(
        &self,
        player_id: Uuid,
        stage: u32,
        level: u32,
        ordinal: u32,
    ) -> DomainResult<Vec<Vote>>;
}
