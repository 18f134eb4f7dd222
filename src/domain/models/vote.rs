//! Vote domain model: settled rows and inbound ballots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::poll::{PollKind, Side};

/// A settled vote row.
///
/// Single-selection kinds persist one row per (player, poll) at slot 0.
/// Quad grouping persists four rows, one per option, slot = option ordinal;
/// only the slot-1 row carries earned points so level sums stay comparable
/// with single-row kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Unique identifier
    pub id: Uuid,
    /// Voting player
    pub player_id: Uuid,
    /// Target poll
    pub poll_id: Uuid,
    /// Row discriminator within the poll (0, or option ordinal for quads)
    pub slot: u32,
    /// The option this row records
    pub option_id: Uuid,
    /// Placement side or group tag, where the kind has one
    pub side: Option<Side>,
    /// Whether the settlement judged this row correct
    pub correct: bool,
    /// Points credited by this row
    pub points_earned: i64,
    /// When first settled
    pub created_at: DateTime<Utc>,
    /// When last resettled
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(player_id: Uuid, poll_id: Uuid, slot: u32, option_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            player_id,
            poll_id,
            slot,
            option_id,
            side: None,
            correct: false,
            points_earned: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the placement side or group tag.
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    /// Record the settlement judgment.
    pub fn with_outcome(mut self, correct: bool, points_earned: i64) -> Self {
        self.correct = correct;
        self.points_earned = points_earned;
        self
    }
}

/// A player's raw selection for one poll, shaped per interaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ballot {
    /// Where the first option was placed; the second implicitly takes the
    /// opposite side.
    BinaryPlacement { first_side: Side },
    /// The four option ordinals split into two pairs, in display order.
    QuadGrouping { groups: [[u32; 2]; 2] },
    /// The single chosen option.
    MultiChoice { option_id: Uuid },
    /// The single chosen option.
    ConsensusVote { option_id: Uuid },
}

impl Ballot {
    /// The poll kind this ballot shape belongs to.
    pub fn kind(&self) -> PollKind {
        match self {
            Self::BinaryPlacement { .. } => PollKind::BinaryPlacement,
            Self::QuadGrouping { .. } => PollKind::QuadGrouping,
            Self::MultiChoice { .. } => PollKind::MultiChoice,
            Self::ConsensusVote { .. } => PollKind::ConsensusVote,
        }
    }

    /// For a quad ballot: the ordinal paired with option 1, after checking
    /// that the groups are a clean 2+2 split of ordinals 1..=4.
    pub fn partner_of_first(&self) -> DomainResult<u32> {
        let Self::QuadGrouping { groups } = self else {
            return Err(DomainError::ValidationFailed(
                "not a quad grouping ballot".to_string(),
            ));
        };
        let mut seen = [false; 4];
        for ordinal in groups.iter().flatten() {
            let index = (*ordinal as usize).checked_sub(1).filter(|i| *i < 4);
            match index {
                Some(i) if !seen[i] => seen[i] = true,
                _ => {
                    return Err(DomainError::ValidationFailed(format!(
                        "grouping must use each ordinal 1..=4 exactly once, got {:?}",
                        groups
                    )))
                }
            }
        }
        let pair = groups
            .iter()
            .find(|pair| pair.contains(&1))
            .ok_or_else(|| {
                DomainError::ValidationFailed("no group contains option 1".to_string())
            })?;
        Ok(if pair[0] == 1 { pair[1] } else { pair[0] })
    }

    /// The group tag for a quad option: the pair holding option 1 is tagged
    /// left, the other right.
    pub fn group_of(&self, ordinal: u32) -> DomainResult<Side> {
        let Self::QuadGrouping { groups } = self else {
            return Err(DomainError::ValidationFailed(
                "not a quad grouping ballot".to_string(),
            ));
        };
        let first_group = groups
            .iter()
            .find(|pair| pair.contains(&1))
            .ok_or_else(|| {
                DomainError::ValidationFailed("no group contains option 1".to_string())
            })?;
        if first_group.contains(&ordinal) {
            Ok(Side::Left)
        } else {
            Ok(Side::Right)
        }
    }
}
