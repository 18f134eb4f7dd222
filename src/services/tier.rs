//! Tier classification for completion interstitials.

use crate::domain::models::{ScoringConfig, TierAward, TierEntry};

/// Maps a completion score onto an authored tier table.
///
/// Tables arrive in whatever order the authoring system produced; thresholds
/// are interpreted as "lowest score that still qualifies", highest qualifying
/// band wins.
pub struct TierClassifier {
    default_label: String,
}

impl TierClassifier {
    pub fn new(default_label: impl Into<String>) -> Self {
        Self {
            default_label: default_label.into(),
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.default_tier_label.clone())
    }

    /// Pick the band for a score: sort descending by threshold, first entry
    /// with `min_score <= score` wins. No qualifying entry yields the
    /// default label, borrowing its texts from a same-labeled entry when
    /// one is configured.
    pub fn classify(&self, score: i64, tiers: &[TierEntry]) -> TierAward {
        let mut sorted: Vec<&TierEntry> = tiers.iter().collect();
        sorted.sort_by(|a, b| b.min_score.cmp(&a.min_score));

        match sorted.into_iter().find(|t| t.min_score <= score) {
            Some(entry) => Self::award(entry),
            None => self.default_award(tiers),
        }
    }

    /// Stage 0 pins the label to fixed calibration cutoffs (90 and 70)
    /// while still sourcing the interstitial texts from the authored entry
    /// carrying that label.
    pub fn classify_stage_zero(&self, score: i64, tiers: &[TierEntry]) -> TierAward {
        let label = if score >= 90 {
            "A"
        } else if score >= 70 {
            "B"
        } else {
            "C"
        };
        match tiers.iter().find(|t| t.label == label) {
            Some(entry) => Self::award(entry),
            None => TierAward {
                label: label.to_string(),
                title: String::new(),
                message: String::new(),
            },
        }
    }

    fn award(entry: &TierEntry) -> TierAward {
        TierAward {
            label: entry.label.clone(),
            title: entry.title.clone(),
            message: entry.message.clone(),
        }
    }

    fn default_award(&self, tiers: &[TierEntry]) -> TierAward {
        match tiers.iter().find(|t| t.label == self.default_label) {
            Some(entry) => Self::award(entry),
            None => TierAward {
                label: self.default_label.clone(),
                title: String::new(),
                message: String::new(),
            },
        }
    }
}
