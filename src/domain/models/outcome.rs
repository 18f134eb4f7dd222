//! Outcome records returned by the settlement and completion paths.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::player::Position;

/// Per-option share of a consensus tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusCount {
    /// Counted option
    pub option_id: Uuid,
    /// Its ordinal within the poll
    pub ordinal: u32,
    /// Votes currently recorded for it (submitter included)
    pub count: u64,
}

/// Tally breakdown attached to consensus settlements so presentation can
/// render "you voted with N% of players".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusBreakdown {
    /// Per-option counts
    pub counts: Vec<ConsensusCount>,
    /// Total votes across all options
    pub total: u64,
    /// Share held by the majority option, 0..=1
    pub majority_share: f64,
    /// Whether the submitter sits in the majority
    pub aligned: bool,
}

impl ConsensusBreakdown {
    /// Judge a tally from the submitter's perspective. The submitter's own
    /// vote must already be folded into the counts. Alignment means the
    /// chosen option holds a maximal count; ties count as majority.
    pub fn evaluate(counts: Vec<ConsensusCount>, voter_option: Uuid) -> Self {
        let total: u64 = counts.iter().map(|c| c.count).sum();
        let majority = counts.iter().map(|c| c.count).max().unwrap_or(0);
        let own = counts
            .iter()
            .find(|c| c.option_id == voter_option)
            .map_or(0, |c| c.count);
        let aligned = majority > 0 && own == majority;
        let majority_share = if total == 0 {
            0.0
        } else {
            majority as f64 / total as f64
        };
        Self { counts, total, majority_share, aligned }
    }

    /// Points awarded for a vote judged against this tally: the base award
    /// scaled by the majority share when aligned, zero otherwise.
    pub fn points(&self, base: i64) -> i64 {
        if self.aligned {
            (base as f64 * self.majority_share).round() as i64
        } else {
            0
        }
    }
}

/// Which boundary a completion grant refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    Level,
    Stage,
}

impl CompletionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Stage => "stage",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "level" => Some(Self::Level),
            "stage" => Some(Self::Stage),
            _ => None,
        }
    }
}

/// Result of attempting a completion grant. The bonus is applied exactly
/// once, on the `JustCompleted` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionState {
    /// Unanswered polls remain behind the boundary
    NotComplete,
    /// This settlement closed the boundary; bonus applied
    JustCompleted,
    /// The boundary was already closed by an earlier settlement
    AlreadyComplete,
}

/// Resolved interstitial content for a just-completed level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAward {
    /// Band label ("A", "B", ...)
    pub label: String,
    /// Headline with template variables resolved
    pub title: String,
    /// Body with template variables resolved
    pub message: String,
}

/// Completion payload attached to the settlement that closed a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    /// Completed stage
    pub stage: u32,
    /// Completed level
    pub level: u32,
    /// Logical settlements within the level
    pub total_votes: u64,
    /// How many of them were judged correct
    pub correct_votes: u64,
    /// Deviance quotient over the level scope, 0..=1
    pub dq: f64,
    /// Points earned within the level
    pub points_earned: i64,
    /// Level bonus credited by this completion (0 when none applies)
    pub bonus: i64,
    /// Stage bonus credited when this completion closed the stage
    pub stage_bonus: i64,
    /// Whether the pointer actually moved
    pub level_up: bool,
    /// Pointer after advancement
    pub next: Position,
    /// Whether the level is configured to show an interstitial
    pub show_interstitial: bool,
    /// Resolved interstitial content, when one applies
    pub tier: Option<TierAward>,
}

/// The record a settlement returns to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// False when the submission was rejected; the vote state is unchanged
    pub success: bool,
    /// Player-safe explanation on rejection
    pub message: Option<String>,
    /// Whether the settlement judged the submission correct
    pub correct: bool,
    /// Points now credited for this poll
    pub points_earned: i64,
    /// Score change applied by this settlement (0 on identical resubmission)
    pub score_delta: i64,
    /// Running total after the settlement
    pub total_score: i64,
    /// Feedback variant for the judgment
    pub feedback: String,
    /// Tally breakdown (consensus polls only)
    pub consensus: Option<ConsensusBreakdown>,
    /// Completion payload when this settlement closed a level or stage
    pub completion: Option<CompletionPayload>,
}

impl SettlementOutcome {
    /// A rejected settlement. Nothing was persisted.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            correct: false,
            points_earned: 0,
            score_delta: 0,
            total_score: 0,
            feedback: String::new(),
            consensus: None,
            completion: None,
        }
    }

    /// A committed settlement.
    pub fn settled(
        correct: bool,
        points_earned: i64,
        score_delta: i64,
        total_score: i64,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            message: None,
            correct,
            points_earned,
            score_delta,
            total_score,
            feedback: feedback.into(),
            consensus: None,
            completion: None,
        }
    }

    /// Attach a consensus breakdown.
    pub fn with_consensus(mut self, consensus: ConsensusBreakdown) -> Self {
        self.consensus = Some(consensus);
        self
    }

    /// Attach a completion payload.
    pub fn with_completion(mut self, completion: CompletionPayload) -> Self {
        self.completion = Some(completion);
        self
    }
}

/// A point-in-time metrics snapshot for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Running score
    pub raw_score: i64,
    /// Awareness quotient, clamped 0..=100
    pub awareness: u8,
    /// Deviance quotient, 0..=1
    pub deviance: f64,
    /// Points earned within the current level
    pub level_points: i64,
    /// Deviance within the current level, 0..=1
    pub level_deviance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_no_state_change() {
        let outcome = SettlementOutcome::failure("poll not found");
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("poll not found"));
        assert_eq!(outcome.score_delta, 0);
        assert!(outcome.completion.is_none());
    }

    #[test]
    fn test_settled_builder() {
        let outcome = SettlementOutcome::settled(true, 12, 12, 40, "Nice")
            .with_consensus(ConsensusBreakdown {
                counts: vec![],
                total: 5,
                majority_share: 0.8,
                aligned: true,
            });
        assert!(outcome.success);
        assert!(outcome.message.is_none());
        assert_eq!(outcome.total_score, 40);
        assert!(outcome.consensus.is_some());
    }

    #[test]
    fn test_consensus_evaluation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let counts = vec![
            ConsensusCount { option_id: a, ordinal: 1, count: 4 },
            ConsensusCount { option_id: b, ordinal: 2, count: 1 },
        ];

        let majority = ConsensusBreakdown::evaluate(counts.clone(), a);
        assert!(majority.aligned);
        assert_eq!(majority.total, 5);
        assert!((majority.majority_share - 0.8).abs() < 1e-9);
        assert_eq!(majority.points(10), 8);

        let minority = ConsensusBreakdown::evaluate(counts, b);
        assert!(!minority.aligned);
        assert_eq!(minority.points(10), 0);
    }

    #[test]
    fn test_consensus_tie_counts_as_majority() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let counts = vec![
            ConsensusCount { option_id: a, ordinal: 1, count: 3 },
            ConsensusCount { option_id: b, ordinal: 2, count: 3 },
        ];
        let tied = ConsensusBreakdown::evaluate(counts, b);
        assert!(tied.aligned);
        assert_eq!(tied.points(100), 50);
    }

    #[test]
    fn test_consensus_first_voter_gets_full_base() {
        let a = Uuid::new_v4();
        let counts = vec![ConsensusCount { option_id: a, ordinal: 1, count: 1 }];
        let first = ConsensusBreakdown::evaluate(counts, a);
        assert!(first.aligned);
        assert_eq!(first.points(12), 12);
    }

    #[test]
    fn test_completion_kind_round_trip() {
        assert_eq!(CompletionKind::from_str("level"), Some(CompletionKind::Level));
        assert_eq!(CompletionKind::from_str("STAGE"), Some(CompletionKind::Stage));
        assert_eq!(CompletionKind::Stage.as_str(), "stage");
        assert_eq!(CompletionKind::from_str("other"), None);
    }
}
