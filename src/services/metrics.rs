//! Awareness and deviance metrics over an identity's vote history.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HistoryEntry, MetricsSnapshot, Position};
use crate::domain::ports::{ConfigRepository, ProgressStore};

/// Count logical settlements (distinct polls) and how many were judged
/// correct. Multi-row settlements count once; a poll counts as correct only
/// when every row of it does.
pub fn settlement_counts(entries: &[HistoryEntry]) -> (u64, u64) {
    let mut polls: HashMap<Uuid, bool> = HashMap::new();
    for entry in entries {
        polls
            .entry(entry.vote.poll_id)
            .and_modify(|correct| *correct &= entry.vote.correct)
            .or_insert(entry.vote.correct);
    }
    let total = polls.len() as u64;
    let correct = polls.values().filter(|c| **c).count() as u64;
    (total, correct)
}

/// Deviance quotient over a scope: incorrect over total, 0 when nothing
/// was answered.
pub fn deviance(total: u64, correct: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (total - correct) as f64 / total as f64
    }
}

/// Calibration-stage awareness: `min(100, 50 + points)` per level, averaged
/// over the levels actually played. Works from history alone, so guest and
/// durable identities land on the same number for the same play.
pub fn calibration_awareness(entries: &[HistoryEntry]) -> u8 {
    let mut levels: BTreeMap<(u32, u32), i64> = BTreeMap::new();
    for entry in entries {
        *levels.entry((entry.stage, entry.level)).or_insert(0) += entry.vote.points_earned;
    }
    if levels.is_empty() {
        return 0;
    }
    let sum: f64 = levels
        .values()
        .map(|points| 100.0_f64.min(50.0 + *points as f64))
        .sum();
    let average = sum / levels.len() as f64;
    average.clamp(0.0, 100.0).round() as u8
}

/// Computes metrics snapshots for one identity.
pub struct MetricsService<C: ConfigRepository> {
    configs: Arc<C>,
}

impl<C: ConfigRepository> MetricsService<C> {
    pub fn new(configs: Arc<C>) -> Self {
        Self { configs }
    }

    /// Point-in-time metrics for the identity behind `store`.
    #[instrument(skip(self, store), fields(identity = %store.identity()))]
    pub async fn snapshot(&self, store: &dyn ProgressStore) -> DomainResult<MetricsSnapshot> {
        let history = store.history().await?;
        let position = store.position().await?;
        let raw_score = store.score().await?;

        let (total, correct) = settlement_counts(&history);
        let overall_deviance = deviance(total, correct);

        let level_entries: Vec<HistoryEntry> = history
            .iter()
            .filter(|e| e.position() == position)
            .cloned()
            .collect();
        let level_points: i64 = level_entries.iter().map(|e| e.vote.points_earned).sum();
        let (level_total, level_correct) = settlement_counts(&level_entries);
        let level_deviance = deviance(level_total, level_correct);

        let awareness = self
            .awareness(store, position, &history, overall_deviance)
            .await?;

        Ok(MetricsSnapshot {
            raw_score,
            awareness,
            deviance: overall_deviance,
            level_points,
            level_deviance,
        })
    }

    /// AQ for the identity. Calibration play (stage 0, and guests in
    /// general) uses the per-level formula; durable players past stage 0
    /// divide earned points by the configured per-stage possible total.
    async fn awareness(
        &self,
        store: &dyn ProgressStore,
        position: Position,
        history: &[HistoryEntry],
        overall_deviance: f64,
    ) -> DomainResult<u8> {
        if !store.is_durable() || position.stage == 0 {
            return Ok(calibration_awareness(history));
        }

        let earned: i64 = history.iter().map(|e| e.vote.points_earned).sum();
        let played: BTreeSet<u32> = history.iter().map(|e| e.stage).collect();
        let mut possible: i64 = 0;
        for stage in played {
            if let Some(config) = self.configs.get_stage(stage).await? {
                possible += config.possible_points;
            }
        }
        if possible <= 0 {
            debug!("no configured possible points, awareness degrades to 0");
            return Ok(0);
        }

        let quotient = (earned as f64 / possible as f64) * 100.0 / (1.0 + overall_deviance);
        Ok(quotient.round().clamp(0.0, 100.0) as u8)
    }
}
