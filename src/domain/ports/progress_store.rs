use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CompletionKind, CompletionState, ConsensusBreakdown, HistoryEntry, Position, Vote,
};

/// Result of committing a consensus vote against one backing store.
#[derive(Debug, Clone)]
pub struct ConsensusSettlement {
    /// The tally the vote joined, submitter included
    pub breakdown: ConsensusBreakdown,
    /// Points now credited for the poll
    pub points: i64,
    /// Score change applied by this settlement
    pub delta: i64,
    /// New running total
    pub total: i64,
}

/// Backing store for one identity's progress, score and vote history.
///
/// Durable players persist shared state in SQLite; guest identities live
/// entirely in a client-held session. Settlement, metrics and message
/// resolution work through this port so both identity kinds share one
/// code path.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Stable identity ID (player ID, or the session-local ID for guests).
    fn identity(&self) -> Uuid;

    /// Whether this identity persists beyond the session.
    fn is_durable(&self) -> bool;

    /// Current progression pointer.
    async fn position(&self) -> DomainResult<Position>;

    /// Move the progression pointer.
    async fn set_position(&self, position: Position) -> DomainResult<()>;

    /// Current running score.
    async fn score(&self) -> DomainResult<i64>;

    /// Rows currently recorded for one poll.
    async fn rows_for_poll(&self, poll_id: Uuid) -> DomainResult<Vec<Vote>>;

    /// Replace the rows for a poll with `entries` and credit the score
    /// delta, atomically. Returns the new running total.
    async fn settle(
        &self,
        poll_id: Uuid,
        entries: Vec<HistoryEntry>,
        delta: i64,
    ) -> DomainResult<i64>;

    /// Commit a consensus vote and evaluate it against the tally it joined.
    /// `base_points` is the full award, scaled down by the majority share.
    /// The entry's judgment fields are filled in by the store.
    async fn settle_consensus(
        &self,
        entry: HistoryEntry,
        base_points: i64,
    ) -> DomainResult<ConsensusSettlement>;

    /// All settled entries in settlement order.
    async fn history(&self) -> DomainResult<Vec<HistoryEntry>>;

    /// Settled entries within one level, in position order.
    async fn level_history(&self, stage: u32, level: u32) -> DomainResult<Vec<HistoryEntry>>;

    /// Rows recorded for the poll at one position, if any.
    async fn rows_at(&self, stage: u32, level: u32, ordinal: u32) -> DomainResult<Vec<Vote>>;

    /// Attempt a completion grant; the bonus is credited exactly once per
    /// (kind, stage, level) boundary.
    async fn grant(
        &self,
        kind: CompletionKind,
        stage: u32,
        level: u32,
        bonus: i64,
    ) -> DomainResult<CompletionState>;
}
