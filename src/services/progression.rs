//! Committing the progress pointer. Settlement only reports where progress
//! would go; nothing moves until the client explicitly asks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Position;
use crate::domain::ports::{ConfigRepository, PollRepository, ProgressStore};
use crate::services::level_completion::resolve_advance;

/// Result of one explicit advance trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub from: Position,
    pub to: Position,
    /// False when the catalog has nowhere further to go.
    pub advanced: bool,
    /// Stage bonus credited by this trigger, when it crossed into a new
    /// stage before any settlement had recorded that crossing.
    pub stage_bonus: i64,
}

/// Moves an identity's (stage, level) pointer to the resolved next position.
pub struct ProgressionAdvancer<P: PollRepository, C: ConfigRepository> {
    polls: Arc<P>,
    configs: Arc<C>,
}

impl<P: PollRepository, C: ConfigRepository> ProgressionAdvancer<P, C> {
    pub fn new(polls: Arc<P>, configs: Arc<C>) -> Self {
        Self { polls, configs }
    }

    /// Commit an advance for the identity behind `store`. The current level
    /// must be fully answered first; the target is re-resolved at trigger
    /// time so a catalog change between completion and trigger cannot send
    /// the pointer somewhere stale.
    #[instrument(skip(self, store), fields(identity = %store.identity()))]
    pub async fn advance(&self, store: &dyn ProgressStore) -> DomainResult<AdvanceOutcome> {
        let from = store.position().await?;

        let polls = self.polls.list_level(from.stage, from.level).await?;
        if !polls.is_empty() {
            let history = store.level_history(from.stage, from.level).await?;
            let answered: HashSet<Uuid> = history.iter().map(|e| e.vote.poll_id).collect();
            if let Some(open) = polls.iter().find(|p| !answered.contains(&p.id)) {
                return Err(DomainError::ValidationFailed(format!(
                    "stage {} level {} still has unanswered polls (next: poll {})",
                    from.stage, from.level, open.ordinal
                )));
            }
        }

        let (to, stage_bonus) = resolve_advance(
            self.polls.as_ref(),
            self.configs.as_ref(),
            store,
            from.stage,
            from.level,
        )
        .await?;
        let advanced = to != from;
        if advanced {
            store.set_position(to).await?;
            info!(from = %from, to = %to, "progress advanced");
        }

        Ok(AdvanceOutcome {
            from,
            to,
            advanced,
            stage_bonus,
        })
    }
}
