//! SQLite implementation of the PlayerRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CompletionKind, CompletionState, Player, Position};
use crate::domain::ports::PlayerRepository;

#[derive(Clone)]
pub struct SqlitePlayerRepository {
    pool: SqlitePool,
}

impl SqlitePlayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerRepository for SqlitePlayerRepository {
    async fn ensure(&self, id: Uuid) -> DomainResult<Player> {
        let now = Utc::now().to_rfc3339();
        let start = Position::start();

        sqlx::query(
            r#"INSERT INTO players (id, score, stage, level, created_at, updated_at)
               VALUES (?, 0, ?, ?, ?, ?)
               ON CONFLICT(id) DO NOTHING"#,
        )
        .bind(id.to_string())
        .bind(start.stage as i64)
        .bind(start.level as i64)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(id).await?.ok_or(DomainError::PlayerNotFound(id))
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Player>> {
        let row: Option<PlayerRow> = sqlx::query_as("SELECT * FROM players WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Player::try_from).transpose()
    }

    async fn set_position(&self, id: Uuid, position: Position) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE players SET stage = ?, level = ?, updated_at = ? WHERE id = ?",
        )
        .bind(position.stage as i64)
        .bind(position.level as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PlayerNotFound(id));
        }
        Ok(())
    }

    async fn add_score(&self, id: Uuid, delta: i64) -> DomainResult<i64> {
        let result = sqlx::query(
            "UPDATE players SET score = score + ?, updated_at = ? WHERE id = ?",
        )
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::PlayerNotFound(id));
        }

        let (total,): (i64,) = sqlx::query_as("SELECT score FROM players WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn grant(
        &self,
        player_id: Uuid,
        kind: CompletionKind,
        stage: u32,
        level: u32,
        bonus: i64,
    ) -> DomainResult<CompletionState> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"INSERT INTO completion_grants (player_id, kind, stage, level, bonus, granted_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(player_id, kind, stage, level) DO NOTHING"#,
        )
        .bind(player_id.to_string())
        .bind(kind.as_str())
        .bind(stage as i64)
        .bind(level as i64)
        .bind(bonus)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CompletionState::AlreadyComplete);
        }

        let updated = sqlx::query(
            "UPDATE players SET score = score + ?, updated_at = ? WHERE id = ?",
        )
        .bind(bonus)
        .bind(&now)
        .bind(player_id.to_string())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DomainError::PlayerNotFound(player_id));
        }

        tx.commit().await?;
        Ok(CompletionState::JustCompleted)
    }
}

#[derive(sqlx::FromRow)]
struct PlayerRow {
    id: String,
    score: i64,
    stage: i64,
    level: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PlayerRow> for Player {
    type Error = DomainError;

    fn try_from(row: PlayerRow) -> Result<Self, Self::Error> {
        Ok(Player {
            id: parse_uuid(&row.id)?,
            score: row.score,
            stage: row.stage as u32,
            level: row.level as u32,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
