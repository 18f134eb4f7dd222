//! Vote settlement: judging a ballot, writing its rows and scoring delta,
//! and detecting the level completion it may have caused.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Ballot, HistoryEntry, Poll, ScoringConfig, SettlementOutcome, Side, TierAward, Vote,
};
use crate::domain::ports::{ConfigRepository, PollRepository, ProgressStore};
use crate::services::level_completion::LevelCompletionService;
use crate::services::message_resolver::MessageResolver;
use crate::services::metrics::MetricsService;
use crate::services::tier::TierClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    /// Consensus settlements serialize per poll so no two voters judge
    /// against the same stale tally.
    Poll(Uuid),
    /// All other settlements serialize per (identity, poll) so the
    /// read-delta-write sequence cannot interleave with itself.
    PlayerPoll(Uuid, Uuid),
}

#[derive(Default)]
struct SettlementLocks {
    inner: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl SettlementLocks {
    async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

/// Judgment of one ballot before it reaches storage.
struct Judgment {
    rows: Vec<Vote>,
    correct: bool,
    points: i64,
    feedback_override: Option<String>,
}

/// The settlement boundary. Every error raised anywhere below it comes back
/// as a structured failure outcome; the vote state is unchanged on failure.
pub struct SettlementService<P: PollRepository, C: ConfigRepository> {
    polls: Arc<P>,
    completion: LevelCompletionService<P, C>,
    resolver: MessageResolver<P, C>,
    locks: SettlementLocks,
}

impl<P: PollRepository, C: ConfigRepository> SettlementService<P, C> {
    pub fn new(polls: Arc<P>, configs: Arc<C>, scoring: &ScoringConfig) -> Self {
        Self {
            completion: LevelCompletionService::new(
                polls.clone(),
                configs.clone(),
                TierClassifier::from_config(scoring),
            ),
            resolver: MessageResolver::new(polls.clone(), MetricsService::new(configs)),
            polls,
            locks: SettlementLocks::default(),
        }
    }

    /// Settle one ballot for the identity behind `store`.
    #[instrument(skip(self, store, ballot), fields(identity = %store.identity(), poll_id = %poll_id))]
    pub async fn settle(
        &self,
        store: &dyn ProgressStore,
        poll_id: Uuid,
        ballot: Ballot,
    ) -> SettlementOutcome {
        match self.try_settle(store, poll_id, ballot).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "settlement rejected");
                SettlementOutcome::failure(err.to_string())
            }
        }
    }

    async fn try_settle(
        &self,
        store: &dyn ProgressStore,
        poll_id: Uuid,
        ballot: Ballot,
    ) -> DomainResult<SettlementOutcome> {
        let poll = self
            .polls
            .get(poll_id)
            .await?
            .ok_or(DomainError::PollNotFound(poll_id))?;

        if poll.stage > 0 && !store.is_durable() {
            return Err(DomainError::Unauthorized(format!(
                "stage {} polls require a signed-in player",
                poll.stage
            )));
        }
        if ballot.kind() != poll.kind {
            return Err(DomainError::ValidationFailed(format!(
                "{} ballot submitted for a {} poll",
                ballot.kind().as_str(),
                poll.kind.as_str()
            )));
        }

        match ballot {
            Ballot::ConsensusVote { option_id } => {
                let _guard = self.locks.acquire(LockKey::Poll(poll_id)).await;
                self.settle_consensus(store, &poll, option_id).await
            }
            _ => {
                let key = LockKey::PlayerPoll(store.identity(), poll_id);
                let _guard = self.locks.acquire(key).await;
                self.settle_judged(store, &poll, &ballot).await
            }
        }
    }

    /// Settlement for the kinds with a predefined judgment (everything but
    /// consensus): judge, write rows plus delta, check completion.
    async fn settle_judged(
        &self,
        store: &dyn ProgressStore,
        poll: &Poll,
        ballot: &Ballot,
    ) -> DomainResult<SettlementOutcome> {
        let previous = store.rows_for_poll(poll.id).await?;
        let newly_covered = previous.is_empty();
        let previous_points: i64 = previous.iter().map(|v| v.points_earned).sum();

        let judgment = match ballot {
            Ballot::BinaryPlacement { first_side } => {
                self.judge_binary(store.identity(), poll, *first_side)?
            }
            Ballot::QuadGrouping { .. } => self.judge_quad(store.identity(), poll, ballot)?,
            Ballot::MultiChoice { option_id } => {
                self.judge_multi(store.identity(), poll, *option_id)?
            }
            Ballot::ConsensusVote { .. } => {
                return Err(DomainError::ConsistencyViolation(
                    "consensus ballots take the tally path".to_string(),
                ))
            }
        };

        let delta = judgment.points - previous_points;
        let entries: Vec<HistoryEntry> = judgment
            .rows
            .into_iter()
            .map(|vote| HistoryEntry {
                vote,
                stage: poll.stage,
                level: poll.level,
                ordinal: poll.ordinal,
            })
            .collect();
        let total = store.settle(poll.id, entries, delta).await?;
        debug!(points = judgment.points, delta, total, "settlement applied");

        let feedback = judgment.feedback_override.unwrap_or_else(|| {
            if judgment.correct {
                poll.feedback_correct.clone()
            } else {
                poll.feedback_incorrect.clone()
            }
        });
        let outcome = SettlementOutcome::settled(
            judgment.correct,
            judgment.points,
            delta,
            total,
            feedback,
        );
        self.attach_completion(store, poll, newly_covered, outcome).await
    }

    /// Both placements must match their tagged sides. Points are the sum of
    /// the two options' point fields, or the poll default when neither is
    /// authored.
    fn judge_binary(&self, identity: Uuid, poll: &Poll, first_side: Side) -> DomainResult<Judgment> {
        let [first, second] = poll.options.as_slice() else {
            return Err(DomainError::ConsistencyViolation(format!(
                "binary poll {} does not have exactly two options",
                poll.id
            )));
        };

        let correct = first.correct_side == Some(first_side)
            && second.correct_side == Some(first_side.opposite());
        let points = if correct {
            match (first.points, second.points) {
                (None, None) => poll.default_points(),
                (a, b) => a.unwrap_or(0) + b.unwrap_or(0),
            }
        } else {
            0
        };

        let row = Vote::new(identity, poll.id, 0, first.id)
            .with_side(first_side)
            .with_outcome(correct, points);
        Ok(Judgment {
            rows: vec![row],
            correct,
            points,
            feedback_override: None,
        })
    }

    /// The pair containing option 1 indexes the anchor's pairing table.
    /// Four rows are written, slot = option ordinal; only slot 1 carries
    /// the pairing score so the level sum stays the single score.
    fn judge_quad(&self, identity: Uuid, poll: &Poll, ballot: &Ballot) -> DomainResult<Judgment> {
        let partner = ballot.partner_of_first()?;
        let anchor = poll.option_by_ordinal(1).ok_or_else(|| {
            DomainError::ConsistencyViolation(format!("quad poll {} has no option 1", poll.id))
        })?;
        let entry = anchor
            .pairing
            .as_ref()
            .and_then(|m| m.entry_for(partner))
            .ok_or_else(|| {
                DomainError::ConsistencyViolation(format!(
                    "quad poll {} has no pairing entry for partner {partner}",
                    poll.id
                ))
            })?;
        let points = entry.points;
        let correct = points > 0;
        let feedback_override = entry.feedback.clone();

        let mut rows = Vec::with_capacity(4);
        for ordinal in 1..=4u32 {
            let option = poll.option_by_ordinal(ordinal).ok_or_else(|| {
                DomainError::ConsistencyViolation(format!(
                    "quad poll {} is missing option {ordinal}",
                    poll.id
                ))
            })?;
            let side = ballot.group_of(ordinal)?;
            let row_points = if ordinal == 1 { points } else { 0 };
            rows.push(
                Vote::new(identity, poll.id, ordinal, option.id)
                    .with_side(side)
                    .with_outcome(correct, row_points),
            );
        }

        Ok(Judgment {
            rows,
            correct,
            points,
            feedback_override,
        })
    }

    /// Points are the chosen option's field; choosing a positive option is
    /// what correctness means here.
    fn judge_multi(&self, identity: Uuid, poll: &Poll, option_id: Uuid) -> DomainResult<Judgment> {
        let option = poll
            .option(option_id)
            .ok_or(DomainError::OptionNotFound(option_id))?;
        let points = option.points.unwrap_or(0);
        let correct = points > 0;

        let row = Vote::new(identity, poll.id, 0, option.id).with_outcome(correct, points);
        Ok(Judgment {
            rows: vec![row],
            correct,
            points,
            feedback_override: option.feedback.clone(),
        })
    }

    /// Consensus settlement delegates the atomic tally-and-judge to the
    /// backing store; the base award is the chosen option's points or the
    /// poll default.
    async fn settle_consensus(
        &self,
        store: &dyn ProgressStore,
        poll: &Poll,
        option_id: Uuid,
    ) -> DomainResult<SettlementOutcome> {
        let option = poll
            .option(option_id)
            .ok_or(DomainError::OptionNotFound(option_id))?;
        let base = option.points.unwrap_or_else(|| poll.default_points());

        let previous = store.rows_for_poll(poll.id).await?;
        let newly_covered = previous.is_empty();

        let entry = HistoryEntry {
            vote: Vote::new(store.identity(), poll.id, 0, option_id),
            stage: poll.stage,
            level: poll.level,
            ordinal: poll.ordinal,
        };
        let settlement = store.settle_consensus(entry, base).await?;
        let correct = settlement.breakdown.aligned;
        debug!(
            points = settlement.points,
            delta = settlement.delta,
            total_votes = settlement.breakdown.total,
            "consensus settlement applied"
        );

        let feedback = if correct {
            poll.feedback_correct.clone()
        } else {
            poll.feedback_incorrect.clone()
        };
        let outcome = SettlementOutcome::settled(
            correct,
            settlement.points,
            settlement.delta,
            settlement.total,
            feedback,
        )
        .with_consensus(settlement.breakdown);
        self.attach_completion(store, poll, newly_covered, outcome).await
    }

    /// Run the completion detector and resolve the tier texts for the
    /// interstitial before the payload leaves the engine.
    async fn attach_completion(
        &self,
        store: &dyn ProgressStore,
        poll: &Poll,
        newly_covered: bool,
        outcome: SettlementOutcome,
    ) -> DomainResult<SettlementOutcome> {
        let Some(mut payload) = self
            .completion
            .check(store, poll.stage, poll.level, newly_covered)
            .await?
        else {
            return Ok(outcome);
        };

        if let Some(tier) = payload.tier.take() {
            payload.tier = Some(TierAward {
                label: tier.label,
                title: self.resolver.resolve(store, &tier.title).await?,
                message: self.resolver.resolve(store, &tier.message).await?,
            });
        }
        Ok(outcome.with_completion(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::session::GuestProgressStore;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, DurableProgressStore, SqliteConfigRepository,
        SqlitePollRepository, SqliteVoteRepository,
    };
    use crate::domain::models::{
        PairingEntry, PairingMatrix, PollKind, PollOption, Side,
    };
    use sqlx::SqlitePool;

    fn service(pool: &SqlitePool) -> SettlementService<SqlitePollRepository, SqliteConfigRepository> {
        SettlementService::new(
            Arc::new(SqlitePollRepository::new(pool.clone())),
            Arc::new(SqliteConfigRepository::new(pool.clone())),
            &ScoringConfig::default(),
        )
    }

    async fn durable(pool: &SqlitePool) -> DurableProgressStore {
        DurableProgressStore::open(pool.clone(), Uuid::new_v4()).await.unwrap()
    }

    async fn seed_binary(pool: &SqlitePool, stage: u32, level: u32, ordinal: u32) -> Poll {
        let mut poll = Poll::new(stage, level, ordinal, PollKind::BinaryPlacement, "Place them")
            .with_feedback("Matched", "Swapped");
        let id = poll.id;
        poll = poll
            .with_option(PollOption::new(id, 1, "Claim").with_correct_side(Side::Left))
            .with_option(PollOption::new(id, 2, "Evidence").with_correct_side(Side::Right));
        SqlitePollRepository::new(pool.clone()).store(&poll).await.unwrap();
        poll
    }

    async fn seed_quad(pool: &SqlitePool, stage: u32, level: u32, ordinal: u32) -> Poll {
        let mut poll = Poll::new(stage, level, ordinal, PollKind::QuadGrouping, "Group them");
        let id = poll.id;
        let pairing = PairingMatrix::from_raw(&HashMap::from([
            ("1-2".to_string(), PairingEntry { points: 12, feedback: Some("Tight pair".to_string()) }),
            ("1-3".to_string(), PairingEntry { points: 4, feedback: None }),
            ("1-4".to_string(), PairingEntry { points: 0, feedback: None }),
        ]))
        .unwrap();
        poll = poll
            .with_option(PollOption::new(id, 1, "Anchor").with_pairing(pairing))
            .with_option(PollOption::new(id, 2, "Buddy"))
            .with_option(PollOption::new(id, 3, "Stray"))
            .with_option(PollOption::new(id, 4, "Other"));
        SqlitePollRepository::new(pool.clone()).store(&poll).await.unwrap();
        poll
    }

    #[tokio::test]
    async fn test_binary_correct_placement_uses_default_points() {
        let pool = create_migrated_test_pool().await.unwrap();
        // Stage 2, level 3: default points = 2 * 2 * 3 = 12.
        let poll = seed_binary(&pool, 2, 3, 1).await;
        seed_binary(&pool, 2, 3, 2).await; // keep the level open

        let store = durable(&pool).await;
        let outcome = service(&pool)
            .settle(&store, poll.id, Ballot::BinaryPlacement { first_side: Side::Left })
            .await;
        assert!(outcome.success, "{:?}", outcome.message);
        assert!(outcome.correct);
        assert_eq!(outcome.points_earned, 12);
        assert_eq!(outcome.score_delta, 12);
        assert_eq!(outcome.feedback, "Matched");
        assert!(outcome.completion.is_none());
    }

    #[tokio::test]
    async fn test_binary_wrong_placement_scores_zero() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_binary(&pool, 1, 1, 1).await;
        seed_binary(&pool, 1, 1, 2).await;

        let store = durable(&pool).await;
        let outcome = service(&pool)
            .settle(&store, poll.id, Ballot::BinaryPlacement { first_side: Side::Right })
            .await;
        assert!(outcome.success);
        assert!(!outcome.correct);
        assert_eq!(outcome.points_earned, 0);
        assert_eq!(outcome.feedback, "Swapped");
    }

    #[tokio::test]
    async fn test_identical_resubmission_delta_is_zero() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_binary(&pool, 1, 1, 1).await;
        seed_binary(&pool, 1, 1, 2).await;

        let store = durable(&pool).await;
        let svc = service(&pool);
        let ballot = Ballot::BinaryPlacement { first_side: Side::Left };

        let first = svc.settle(&store, poll.id, ballot.clone()).await;
        assert_eq!(first.score_delta, 2);

        let second = svc.settle(&store, poll.id, ballot).await;
        assert!(second.success);
        assert_eq!(second.score_delta, 0);
        assert_eq!(second.total_score, first.total_score);
    }

    #[tokio::test]
    async fn test_correction_applies_negative_delta() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_binary(&pool, 1, 1, 1).await;
        seed_binary(&pool, 1, 1, 2).await;

        let store = durable(&pool).await;
        let svc = service(&pool);

        let right = svc
            .settle(&store, poll.id, Ballot::BinaryPlacement { first_side: Side::Left })
            .await;
        assert_eq!(right.total_score, 2);

        let wrong = svc
            .settle(&store, poll.id, Ballot::BinaryPlacement { first_side: Side::Right })
            .await;
        assert!(wrong.success);
        assert_eq!(wrong.score_delta, -2);
        assert_eq!(wrong.total_score, 0);
    }

    #[tokio::test]
    async fn test_quad_rows_sum_to_single_pairing_score() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_quad(&pool, 1, 1, 1).await;
        seed_binary(&pool, 1, 1, 2).await;

        let store = durable(&pool).await;
        let outcome = service(&pool)
            .settle(&store, poll.id, Ballot::QuadGrouping { groups: [[1, 2], [3, 4]] })
            .await;
        assert!(outcome.success, "{:?}", outcome.message);
        assert!(outcome.correct);
        assert_eq!(outcome.points_earned, 12);
        assert_eq!(outcome.feedback, "Tight pair");

        let rows = store.rows_for_poll(poll.id).await.unwrap();
        assert_eq!(rows.len(), 4);
        let summed: i64 = rows.iter().map(|r| r.points_earned).sum();
        assert_eq!(summed, 12);
        assert_eq!(store.score().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_quad_regrouping_replaces_previous_rows() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_quad(&pool, 1, 1, 1).await;
        seed_binary(&pool, 1, 1, 2).await;

        let store = durable(&pool).await;
        let svc = service(&pool);

        svc.settle(&store, poll.id, Ballot::QuadGrouping { groups: [[1, 2], [3, 4]] })
            .await;
        let second = svc
            .settle(&store, poll.id, Ballot::QuadGrouping { groups: [[1, 3], [2, 4]] })
            .await;
        assert!(second.success);
        assert_eq!(second.points_earned, 4);
        assert_eq!(second.score_delta, -8);
        assert_eq!(store.score().await.unwrap(), 4);
        assert_eq!(store.rows_for_poll(poll.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_guest_blocked_from_later_stages() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_binary(&pool, 1, 1, 1).await;

        let votes = Arc::new(SqliteVoteRepository::new(pool.clone()));
        let guest = GuestProgressStore::new(votes);
        let outcome = service(&pool)
            .settle(&guest, poll.id, Ballot::BinaryPlacement { first_side: Side::Left })
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.as_deref().is_some_and(|m| m.contains("signed-in")));
        assert_eq!(guest.score().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_poll_is_a_structured_failure() {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = durable(&pool).await;
        let outcome = service(&pool)
            .settle(&store, Uuid::new_v4(), Ballot::MultiChoice { option_id: Uuid::new_v4() })
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.is_some());
    }

    #[tokio::test]
    async fn test_mismatched_ballot_kind_rejected() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_binary(&pool, 1, 1, 1).await;

        let store = durable(&pool).await;
        let outcome = service(&pool)
            .settle(&store, poll.id, Ballot::MultiChoice { option_id: poll.options[0].id })
            .await;
        assert!(!outcome.success);
        assert_eq!(store.rows_for_poll(poll.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_completing_the_level_attaches_payload() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_binary(&pool, 1, 1, 1).await;
        seed_binary(&pool, 1, 2, 1).await;

        let store = durable(&pool).await;
        let outcome = service(&pool)
            .settle(&store, poll.id, Ballot::BinaryPlacement { first_side: Side::Left })
            .await;
        assert!(outcome.success);

        let completion = outcome.completion.expect("level should have completed");
        assert_eq!(completion.points_earned, 2);
        assert_eq!(completion.bonus, 2); // dq = 0
        assert!(completion.level_up);
        assert_eq!(completion.next.stage, 1);
        assert_eq!(completion.next.level, 2);
        // Settled 2 + bonus 2.
        assert_eq!(store.score().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_consensus_outcome_carries_breakdown() {
        let pool = create_migrated_test_pool().await.unwrap();
        let mut poll = Poll::new(1, 1, 1, PollKind::ConsensusVote, "Pick a side");
        let id = poll.id;
        poll = poll
            .with_option(PollOption::new(id, 1, "North").with_points(10))
            .with_option(PollOption::new(id, 2, "South").with_points(10));
        SqlitePollRepository::new(pool.clone()).store(&poll).await.unwrap();
        seed_binary(&pool, 1, 1, 2).await;

        let svc = service(&pool);
        let alice = durable(&pool).await;
        let bob = durable(&pool).await;

        let first = svc
            .settle(&alice, poll.id, Ballot::ConsensusVote { option_id: poll.options[0].id })
            .await;
        assert!(first.success, "{:?}", first.message);
        assert!(first.correct);
        assert_eq!(first.points_earned, 10);
        let breakdown = first.consensus.expect("tally breakdown");
        assert_eq!(breakdown.total, 1);

        let second = svc
            .settle(&bob, poll.id, Ballot::ConsensusVote { option_id: poll.options[1].id })
            .await;
        assert!(second.success);
        let breakdown = second.consensus.expect("tally breakdown");
        assert_eq!(breakdown.total, 2);
        assert!(breakdown.aligned); // 1-1 tie counts as majority
        assert_eq!(second.points_earned, 5);
    }

    #[tokio::test]
    async fn test_stage_zero_parity_between_identity_kinds() {
        let pool = create_migrated_test_pool().await.unwrap();
        let mut poll = Poll::new(0, 1, 1, PollKind::MultiChoice, "Calibration");
        let id = poll.id;
        poll = poll
            .with_option(PollOption::new(id, 1, "Sharp").with_points(30))
            .with_option(PollOption::new(id, 2, "Dull"));
        SqlitePollRepository::new(pool.clone()).store(&poll).await.unwrap();

        let svc = service(&pool);
        let ballot = Ballot::MultiChoice { option_id: poll.options[0].id };

        let player = durable(&pool).await;
        let durable_outcome = svc.settle(&player, poll.id, ballot.clone()).await;

        let votes = Arc::new(SqliteVoteRepository::new(pool.clone()));
        let guest = GuestProgressStore::new(votes);
        let guest_outcome = svc.settle(&guest, poll.id, ballot).await;

        assert!(durable_outcome.success && guest_outcome.success);
        assert_eq!(durable_outcome.points_earned, guest_outcome.points_earned);

        let durable_tier = durable_outcome.completion.unwrap().tier.unwrap();
        let guest_tier = guest_outcome.completion.unwrap().tier.unwrap();
        // Identical play yields the identical calibration tier.
        assert_eq!(durable_tier.label, guest_tier.label);
    }
}
