//! Per-level and per-stage configuration records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// One tier band of a level's classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    /// Lowest score that still falls into this band
    pub min_score: i64,
    /// Short band label ("A", "B", ...)
    pub label: String,
    /// Interstitial headline template
    #[serde(default)]
    pub title: String,
    /// Interstitial body template
    #[serde(default)]
    pub message: String,
}

/// Per-(stage, level) configuration: interstitial toggle plus the tier
/// threshold table for the completion screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Unique identifier
    pub id: Uuid,
    /// Stage this record configures
    pub stage: u32,
    /// Level this record configures
    pub level: u32,
    /// Whether to show an interstitial when the level completes
    pub show_interstitial: bool,
    /// Tier bands, any authored order
    pub tiers: Vec<TierEntry>,
}

impl LevelConfig {
    pub fn new(stage: u32, level: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage,
            level,
            show_interstitial: true,
            tiers: Vec::new(),
        }
    }

    /// Toggle the interstitial.
    pub fn with_interstitial(mut self, show: bool) -> Self {
        self.show_interstitial = show;
        self
    }

    /// Append a tier band.
    pub fn with_tier(mut self, tier: TierEntry) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Replace the tier table.
    pub fn with_tiers(mut self, tiers: Vec<TierEntry>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Parse an authored tier table from its stored JSON form. Strict:
    /// malformed JSON is an error, never an empty default.
    pub fn parse_tiers(raw: &str) -> DomainResult<Vec<TierEntry>> {
        serde_json::from_str(raw).map_err(|e| {
            DomainError::ValidationFailed(format!("malformed tier table: {e}"))
        })
    }
}

/// Per-stage configuration: the completion bonus and the stage's total
/// attainable points (the awareness quotient denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage this record configures
    pub stage: u32,
    /// Bonus credited when the stage completes
    pub completion_bonus: i64,
    /// Total points attainable across the stage's polls
    pub possible_points: i64,
}

impl StageConfig {
    pub fn new(stage: u32) -> Self {
        Self { stage, completion_bonus: 0, possible_points: 0 }
    }

    pub fn with_bonus(mut self, bonus: i64) -> Self {
        self.completion_bonus = bonus;
        self
    }

    pub fn with_possible_points(mut self, points: i64) -> Self {
        self.possible_points = points;
        self
    }
}
