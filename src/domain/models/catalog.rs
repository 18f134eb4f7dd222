//! Authored content catalog, the boundary format the import command reads.
//!
//! The catalog is produced by the external authoring system. Option ordinals
//! are implicit in list order; pairing tables use the authored `1-N` key
//! form. Conversion into domain records validates strictly, so malformed
//! content fails the import instead of corrupting settlement later.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::level_config::{LevelConfig, StageConfig, TierEntry};
use crate::domain::models::poll::{PairingEntry, PairingMatrix, Poll, PollKind, PollOption, Side};

/// One authored option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogOption {
    /// Display content
    pub content: String,
    /// Side tag for binary placement
    #[serde(default)]
    pub correct_side: Option<Side>,
    /// Point value
    #[serde(default)]
    pub points: Option<i64>,
    /// Pairing table in authored key form ("1-2", "1-3", "1-4")
    #[serde(default)]
    pub pairings: Option<HashMap<String, PairingEntry>>,
    /// Option-level feedback
    #[serde(default)]
    pub feedback: Option<String>,
}

/// One authored poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPoll {
    /// Stage
    pub stage: u32,
    /// Level within the stage
    pub level: u32,
    /// Order within the level
    pub order: u32,
    /// Interaction kind
    pub kind: PollKind,
    /// Display title
    pub title: String,
    /// Player-facing instructions
    #[serde(default)]
    pub instructions: String,
    /// Feedback shown on a correct settlement
    #[serde(default)]
    pub feedback_correct: String,
    /// Feedback shown on an incorrect settlement
    #[serde(default)]
    pub feedback_incorrect: String,
    /// Optional artwork caption
    #[serde(default)]
    pub overlay_caption: Option<String>,
    /// Options in ordinal order
    pub options: Vec<CatalogOption>,
}

/// One authored level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLevel {
    pub stage: u32,
    pub level: u32,
    #[serde(default = "default_show_interstitial")]
    pub show_interstitial: bool,
    #[serde(default)]
    pub tiers: Vec<TierEntry>,
}

const fn default_show_interstitial() -> bool {
    true
}

/// One authored stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStage {
    pub stage: u32,
    #[serde(default)]
    pub completion_bonus: i64,
    #[serde(default)]
    pub possible_points: i64,
}

/// A complete authored catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub polls: Vec<CatalogPoll>,
    #[serde(default)]
    pub levels: Vec<CatalogLevel>,
    #[serde(default)]
    pub stages: Vec<CatalogStage>,
}

impl Catalog {
    /// Parse from YAML text.
    pub fn from_yaml(text: &str) -> DomainResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| DomainError::ValidationFailed(format!("malformed catalog: {e}")))
    }

    /// Convert into validated domain records.
    pub fn into_domain(self) -> DomainResult<CatalogRecords> {
        let mut positions = HashSet::new();
        let mut polls = Vec::with_capacity(self.polls.len());
        for authored in self.polls {
            let position = (authored.stage, authored.level, authored.order);
            if !positions.insert(position) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate poll position stage {} level {} order {}",
                    position.0, position.1, position.2
                )));
            }
            polls.push(authored.into_poll()?);
        }

        let mut level_keys = HashSet::new();
        let mut levels = Vec::with_capacity(self.levels.len());
        for authored in self.levels {
            if !level_keys.insert((authored.stage, authored.level)) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate level config for stage {} level {}",
                    authored.stage, authored.level
                )));
            }
            levels.push(
                LevelConfig::new(authored.stage, authored.level)
                    .with_interstitial(authored.show_interstitial)
                    .with_tiers(authored.tiers),
            );
        }

        let mut stage_keys = HashSet::new();
        let mut stages = Vec::with_capacity(self.stages.len());
        for authored in self.stages {
            if !stage_keys.insert(authored.stage) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate stage config for stage {}",
                    authored.stage
                )));
            }
            stages.push(
                StageConfig::new(authored.stage)
                    .with_bonus(authored.completion_bonus)
                    .with_possible_points(authored.possible_points),
            );
        }

        Ok(CatalogRecords { polls, levels, stages })
    }
}

/// Validated domain records ready for storage.
#[derive(Debug, Clone)]
pub struct CatalogRecords {
    pub polls: Vec<Poll>,
    pub levels: Vec<LevelConfig>,
    pub stages: Vec<StageConfig>,
}

impl CatalogPoll {
    fn into_poll(self) -> DomainResult<Poll> {
        let mut poll = Poll::new(self.stage, self.level, self.order, self.kind, self.title)
            .with_instructions(self.instructions)
            .with_feedback(self.feedback_correct, self.feedback_incorrect);
        poll.overlay_caption = self.overlay_caption;

        let poll_id = poll.id;
        for (index, authored) in self.options.into_iter().enumerate() {
            let ordinal = u32::try_from(index + 1).map_err(|_| {
                DomainError::ValidationFailed("too many options".to_string())
            })?;
            let mut option = PollOption::new(poll_id, ordinal, authored.content);
            option.correct_side = authored.correct_side;
            option.points = authored.points;
            option.feedback = authored.feedback;
            if let Some(raw) = authored.pairings {
                option.pairing = Some(PairingMatrix::from_raw(&raw)?);
            }
            poll = poll.with_option(option);
        }

        poll.validate()?;
        Ok(poll)
    }
}
