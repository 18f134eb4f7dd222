//! Poll domain model.
//!
//! Polls are the interactive units of the game. They are addressed by a
//! (stage, level, order) position and come in four interaction kinds, each
//! with its own scoring rule.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Interaction kind of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    /// Two options are each placed onto one of two sides; correctness
    /// requires both placements to match their tagged side.
    BinaryPlacement,
    /// Four options are split into two pairs; the pair containing the first
    /// option is scored against its pairing table.
    QuadGrouping,
    /// Single selection from a list; the chosen option's point value decides
    /// both score and correctness.
    MultiChoice,
    /// No predefined answer; correctness is alignment with the majority of
    /// all votes on the poll at commit time.
    ConsensusVote,
}

impl PollKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BinaryPlacement => "binary_placement",
            Self::QuadGrouping => "quad_grouping",
            Self::MultiChoice => "multi_choice",
            Self::ConsensusVote => "consensus_vote",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "binary_placement" => Some(Self::BinaryPlacement),
            "quad_grouping" => Some(Self::QuadGrouping),
            "multi_choice" => Some(Self::MultiChoice),
            "consensus_vote" => Some(Self::ConsensusVote),
            _ => None,
        }
    }

    /// Number of options this kind requires, if fixed.
    pub fn required_options(&self) -> Option<usize> {
        match self {
            Self::BinaryPlacement | Self::ConsensusVote => Some(2),
            Self::QuadGrouping => Some(4),
            Self::MultiChoice => None,
        }
    }
}

/// One of the two placement sides. Doubles as the group tag for
/// quad-grouping settlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Score and feedback for one possible pairing of a quad-grouping poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingEntry {
    /// Points awarded when this pairing is chosen.
    pub points: i64,
    /// Pairing-specific feedback text, if authored.
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Validated pairing-score table for a quad-grouping poll.
///
/// Authored as a loose map keyed `"1-2"`, `"1-3"`, `"1-4"` (the pairings the
/// first option can take part in). Parsed into partner-ordinal form at the
/// load boundary; malformed keys are an error, never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingMatrix {
    entries: BTreeMap<u32, PairingEntry>,
}

impl PairingMatrix {
    /// Build from the authored key form. Keys must be `1-<partner>` with
    /// partner in 2..=4.
    pub fn from_raw(raw: &HashMap<String, PairingEntry>) -> DomainResult<Self> {
        let mut entries = BTreeMap::new();
        for (key, entry) in raw {
            let partner = key
                .strip_prefix("1-")
                .and_then(|p| p.parse::<u32>().ok())
                .filter(|p| (2..=4).contains(p))
                .ok_or_else(|| {
                    DomainError::ValidationFailed(format!(
                        "invalid pairing key '{key}' (expected 1-2, 1-3 or 1-4)"
                    ))
                })?;
            entries.insert(partner, entry.clone());
        }
        Ok(Self { entries })
    }

    /// Look up the entry for pairing the first option with `partner_ordinal`.
    pub fn entry_for(&self, partner_ordinal: u32) -> Option<&PairingEntry> {
        self.entries.get(&partner_ordinal)
    }

    /// Render back to the authored key form for storage.
    pub fn to_raw(&self) -> HashMap<String, PairingEntry> {
        self.entries
            .iter()
            .map(|(partner, entry)| (format!("1-{partner}"), entry.clone()))
            .collect()
    }

    /// True when all three possible pairings are present.
    pub fn is_complete(&self) -> bool {
        [2, 3, 4].iter().all(|p| self.entries.contains_key(p))
    }
}

/// A selectable option belonging to a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    /// Unique identifier
    pub id: Uuid,
    /// Owning poll
    pub poll_id: Uuid,
    /// Position within the poll (1-based; ordinal 1 anchors quad pairings)
    pub ordinal: u32,
    /// Display content
    pub content: String,
    /// Side this option belongs on (binary placement only)
    pub correct_side: Option<Side>,
    /// Point value (multi-choice, and the binary placement sum)
    pub points: Option<i64>,
    /// Pairing-score table (quad grouping, ordinal 1 only)
    pub pairing: Option<PairingMatrix>,
    /// Free-text feedback shown when this option is chosen
    pub feedback: Option<String>,
}

impl PollOption {
    pub fn new(poll_id: Uuid, ordinal: u32, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            poll_id,
            ordinal,
            content: content.into(),
            correct_side: None,
            points: None,
            pairing: None,
            feedback: None,
        }
    }

    /// Tag the correct side for binary placement.
    pub fn with_correct_side(mut self, side: Side) -> Self {
        self.correct_side = Some(side);
        self
    }

    /// Set the point value.
    pub fn with_points(mut self, points: i64) -> Self {
        self.points = Some(points);
        self
    }

    /// Attach a pairing table.
    pub fn with_pairing(mut self, pairing: PairingMatrix) -> Self {
        self.pairing = Some(pairing);
        self
    }

    /// Attach option-level feedback.
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// An interactive poll addressed by (stage, level, order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    /// Unique identifier
    pub id: Uuid,
    /// Stage (0 = unauthenticated calibration)
    pub stage: u32,
    /// Level within the stage (1-based)
    pub level: u32,
    /// Order within the level (1-based, defines sequence)
    pub ordinal: u32,
    /// Interaction kind
    pub kind: PollKind,
    /// Display title
    pub title: String,
    /// Player-facing instructions
    pub instructions: String,
    /// Feedback variant shown after a correct settlement
    pub feedback_correct: String,
    /// Feedback variant shown after an incorrect settlement
    pub feedback_incorrect: String,
    /// Optional caption rendered over the poll artwork
    pub overlay_caption: Option<String>,
    /// Options, ordered by ordinal
    pub options: Vec<PollOption>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(stage: u32, level: u32, ordinal: u32, kind: PollKind, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stage,
            level,
            ordinal,
            kind,
            title: title.into(),
            instructions: String::new(),
            feedback_correct: String::new(),
            feedback_incorrect: String::new(),
            overlay_caption: None,
            options: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the instruction text.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set both feedback variants.
    pub fn with_feedback(
        mut self,
        correct: impl Into<String>,
        incorrect: impl Into<String>,
    ) -> Self {
        self.feedback_correct = correct.into();
        self.feedback_incorrect = incorrect.into();
        self
    }

    /// Append an option (keeps ordinal ordering).
    pub fn with_option(mut self, option: PollOption) -> Self {
        self.options.push(option);
        self.options.sort_by_key(|o| o.ordinal);
        self
    }

    /// Find an option by id.
    pub fn option(&self, id: Uuid) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Find an option by its 1-based ordinal.
    pub fn option_by_ordinal(&self, ordinal: u32) -> Option<&PollOption> {
        self.options.iter().find(|o| o.ordinal == ordinal)
    }

    /// The text used when a message references this poll's question: the
    /// instruction text during the calibration stage, the title otherwise.
    pub fn question_text(&self) -> &str {
        if self.stage == 0 {
            &self.instructions
        } else {
            &self.title
        }
    }

    /// Default point value when options carry none:
    /// `2 * max(1, stage) * max(1, level)`.
    pub fn default_points(&self) -> i64 {
        2 * i64::from(self.stage.max(1)) * i64::from(self.level.max(1))
    }

    /// Validate structural invariants for this poll's kind.
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "poll title cannot be empty".to_string(),
            ));
        }
        if self.level == 0 || self.ordinal == 0 {
            return Err(DomainError::ValidationFailed(
                "poll level and order are 1-based".to_string(),
            ));
        }
        if let Some(required) = self.kind.required_options() {
            if self.options.len() != required {
                return Err(DomainError::ValidationFailed(format!(
                    "{} poll requires exactly {} options, found {}",
                    self.kind.as_str(),
                    required,
                    self.options.len()
                )));
            }
        } else if self.options.len() < 2 {
            return Err(DomainError::ValidationFailed(
                "multi_choice poll requires at least 2 options".to_string(),
            ));
        }

        match self.kind {
            PollKind::BinaryPlacement => {
                if self.options.iter().any(|o| o.correct_side.is_none()) {
                    return Err(DomainError::ValidationFailed(
                        "binary_placement options must all carry a correct side".to_string(),
                    ));
                }
            }
            PollKind::QuadGrouping => {
                let anchor = self.option_by_ordinal(1).ok_or_else(|| {
                    DomainError::ValidationFailed(
                        "quad_grouping poll is missing option 1".to_string(),
                    )
                })?;
                match &anchor.pairing {
                    Some(pairing) if pairing.is_complete() => {}
                    Some(_) => {
                        return Err(DomainError::ValidationFailed(
                            "quad_grouping pairing table must cover partners 2, 3 and 4"
                                .to_string(),
                        ))
                    }
                    None => {
                        return Err(DomainError::ValidationFailed(
                            "quad_grouping option 1 must carry a pairing table".to_string(),
                        ))
                    }
                }
            }
            PollKind::MultiChoice | PollKind::ConsensusVote => {}
        }
        Ok(())
    }
}
