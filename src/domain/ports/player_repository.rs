use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CompletionKind, CompletionState, Player, Position};

/// Repository port for durable player identities and completion grants.
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Get a player if one exists, otherwise create the row with the
    /// starting pointer and zero score. First interaction bootstraps.
    async fn ensure(&self, id: Uuid) -> DomainResult<Player>;

    /// Get a player by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Player>>;

    /// Move the progression pointer.
    async fn set_position(&self, id: Uuid, position: Position) -> DomainResult<()>;

    /// Credit a score delta. Returns the new running total.
    async fn add_score(&self, id: Uuid, delta: i64) -> DomainResult<i64>;

    /// Attempt a completion grant for (player, kind, stage, level). The
    /// first attempt lands the ledger row and credits the bonus in the same
    /// transaction, returning `JustCompleted`; every later attempt returns
    /// `AlreadyComplete` without touching the score.
    async fn grant(
        &self,
        player_id: Uuid,
        kind: CompletionKind,
        stage: u32,
        level: u32,
        bonus: i64,
    ) -> DomainResult<CompletionState>;
}
