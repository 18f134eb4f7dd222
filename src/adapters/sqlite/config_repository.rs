//! SQLite implementation of the ConfigRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_uuid;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LevelConfig, StageConfig};
use crate::domain::ports::ConfigRepository;

#[derive(Clone)]
pub struct SqliteConfigRepository {
    pool: SqlitePool,
}

impl SqliteConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigRepository for SqliteConfigRepository {
    async fn store_level(&self, config: &LevelConfig) -> DomainResult<()> {
        let tiers_json = serde_json::to_string(&config.tiers)?;

        sqlx::query(
            r#"INSERT INTO level_configs (id, stage, level, show_interstitial, tiers)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(stage, level) DO UPDATE SET
                   show_interstitial = excluded.show_interstitial,
                   tiers = excluded.tiers"#,
        )
        .bind(config.id.to_string())
        .bind(config.stage as i64)
        .bind(config.level as i64)
        .bind(config.show_interstitial)
        .bind(&tiers_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_level(&self, stage: u32, level: u32) -> DomainResult<Option<LevelConfig>> {
        let row: Option<LevelConfigRow> = sqlx::query_as(
            "SELECT * FROM level_configs WHERE stage = ? AND level = ?",
        )
        .bind(stage as i64)
        .bind(level as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LevelConfig::try_from).transpose()
    }

    async fn store_stage(&self, config: &StageConfig) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO stage_configs (stage, completion_bonus, possible_points)
               VALUES (?, ?, ?)
               ON CONFLICT(stage) DO UPDATE SET
                   completion_bonus = excluded.completion_bonus,
                   possible_points = excluded.possible_points"#,
        )
        .bind(config.stage as i64)
        .bind(config.completion_bonus)
        .bind(config.possible_points)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_stage(&self, stage: u32) -> DomainResult<Option<StageConfig>> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            "SELECT stage, completion_bonus, possible_points FROM stage_configs WHERE stage = ?",
        )
        .bind(stage as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(stage, completion_bonus, possible_points)| StageConfig {
            stage: stage as u32,
            completion_bonus,
            possible_points,
        }))
    }

    async fn list_stages(&self) -> DomainResult<Vec<StageConfig>> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            "SELECT stage, completion_bonus, possible_points FROM stage_configs ORDER BY stage",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(stage, completion_bonus, possible_points)| StageConfig {
                stage: stage as u32,
                completion_bonus,
                possible_points,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct LevelConfigRow {
    id: String,
    stage: i64,
    level: i64,
    show_interstitial: bool,
    tiers: String,
}

impl TryFrom<LevelConfigRow> for LevelConfig {
    type Error = DomainError;

    fn try_from(row: LevelConfigRow) -> Result<Self, Self::Error> {
        Ok(LevelConfig {
            id: parse_uuid(&row.id)?,
            stage: row.stage as u32,
            level: row.level as u32,
            show_interstitial: row.show_interstitial,
            tiers: LevelConfig::parse_tiers(&row.tiers)?,
        })
    }
}
