//! Level completion detection and its scoring consequences.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CompletionKind, CompletionPayload, CompletionState, Position};
use crate::domain::ports::{ConfigRepository, PollRepository, ProgressStore};
use crate::services::metrics::{calibration_awareness, deviance, settlement_counts};
use crate::services::tier::TierClassifier;

/// Bonus for closing a level: earned points discounted by deviance.
pub fn completion_bonus(points_earned: i64, dq: f64) -> i64 {
    (points_earned as f64 / (1.0 + dq)).round() as i64
}

/// Detects when a settlement closes the identity's current level and applies
/// the consequences: the level bonus, stage transitions with their one-time
/// bonus, and the tier classification for the interstitial.
///
/// The progression pointer itself is not moved here; the payload carries the
/// resolved target and the advancer commits it on explicit trigger.
pub struct LevelCompletionService<P: PollRepository, C: ConfigRepository> {
    polls: Arc<P>,
    configs: Arc<C>,
    classifier: TierClassifier,
}

impl<P: PollRepository, C: ConfigRepository> LevelCompletionService<P, C> {
    pub fn new(polls: Arc<P>, configs: Arc<C>, classifier: TierClassifier) -> Self {
        Self {
            polls,
            configs,
            classifier,
        }
    }

    /// Check whether the settlement that just wrote rows at (stage, level)
    /// completed that level. `newly_covered` is false on resubmissions,
    /// which can never complete anything.
    #[instrument(skip(self, store), fields(identity = %store.identity()))]
    pub async fn check(
        &self,
        store: &dyn ProgressStore,
        stage: u32,
        level: u32,
        newly_covered: bool,
    ) -> DomainResult<Option<CompletionPayload>> {
        if !newly_covered {
            return Ok(None);
        }

        let polls = self.polls.list_level(stage, level).await?;
        if polls.is_empty() {
            return Ok(None);
        }

        let history = store.level_history(stage, level).await?;
        let answered: HashSet<Uuid> = history.iter().map(|e| e.vote.poll_id).collect();
        if polls.iter().any(|p| !answered.contains(&p.id)) {
            return Ok(None);
        }

        let (total_votes, correct_votes) = settlement_counts(&history);
        let dq = deviance(total_votes, correct_votes);
        let points_earned: i64 = history.iter().map(|e| e.vote.points_earned).sum();
        let computed = completion_bonus(points_earned, dq);

        // The grant ledger makes the bonus exactly-once even if two
        // concurrent settlements both observe full coverage.
        let mut bonus = 0;
        if stage > 0 {
            let state = store
                .grant(CompletionKind::Level, stage, level, computed)
                .await?;
            if state == CompletionState::JustCompleted {
                bonus = computed;
            }
        }

        let (next, stage_bonus) =
            resolve_advance(self.polls.as_ref(), self.configs.as_ref(), store, stage, level)
                .await?;
        let level_up = next != Position::new(stage, level);

        let config = self.configs.get_level(stage, level).await?;
        let show_interstitial = config.as_ref().map_or(true, |c| c.show_interstitial);
        let tiers = config.map(|c| c.tiers).unwrap_or_default();

        let tier = if stage == 0 {
            let aq = i64::from(calibration_awareness(&store.history().await?));
            Some(self.classifier.classify_stage_zero(aq, &tiers))
        } else {
            Some(self.classifier.classify(points_earned + bonus, &tiers))
        };

        info!(stage, level, points_earned, bonus, stage_bonus, level_up, "level completed");

        Ok(Some(CompletionPayload {
            stage,
            level,
            total_votes,
            correct_votes,
            dq,
            points_earned,
            bonus,
            stage_bonus,
            level_up,
            next,
            show_interstitial,
            tier,
        }))
    }

}

/// Resolve where progress goes from a completed (stage, level): the next
/// level in the same stage when it has polls, else level 1 of the next
/// stage (crediting the completed stage's one-time bonus), else progress
/// stays put. Shared with the advancer so both report the same target.
pub(crate) async fn resolve_advance<P: PollRepository + ?Sized, C: ConfigRepository + ?Sized>(
    polls: &P,
    configs: &C,
    store: &dyn ProgressStore,
    stage: u32,
    level: u32,
) -> DomainResult<(Position, i64)> {
    let levels = polls.levels_in_stage(stage).await?;
    if levels.contains(&(level + 1)) {
        return Ok((Position::new(stage, level + 1), 0));
    }

    let stages = polls.stages().await?;
    if stages.contains(&(stage + 1)) {
        let configured = configs.get_stage(stage).await?.map_or(0, |c| c.completion_bonus);
        let state = store
            .grant(CompletionKind::Stage, stage, 0, configured)
            .await?;
        let stage_bonus = if state == CompletionState::JustCompleted {
            configured
        } else {
            0
        };
        return Ok((Position::new(stage + 1, 1), stage_bonus));
    }

    Ok((Position::new(stage, level), 0))
}
