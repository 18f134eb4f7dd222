//! SQLite implementation of the VoteRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConsensusCount, HistoryEntry, Side, Vote};
use crate::domain::ports::VoteRepository;

#[derive(Clone)]
pub struct SqliteVoteRepository {
    pool: SqlitePool,
}

impl SqliteVoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepository for SqliteVoteRepository {
    async fn rows_for_poll(&self, player_id: Uuid, poll_id: Uuid) -> DomainResult<Vec<Vote>> {
        let rows: Vec<VoteRow> = sqlx::query_as(
            "SELECT * FROM votes WHERE player_id = ? AND poll_id = ? ORDER BY slot",
        )
        .bind(player_id.to_string())
        .bind(poll_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Vote::try_from).collect()
    }

    async fn settle(
        &self,
        player_id: Uuid,
        poll_id: Uuid,
        rows: &[Vote],
        score_delta: i64,
    ) -> DomainResult<i64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for vote in rows {
            sqlx::query(
                r#"INSERT INTO votes (id, player_id, poll_id, slot, option_id, side,
                   correct, points_earned, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(player_id, poll_id, slot) DO UPDATE SET
                       option_id = excluded.option_id,
                       side = excluded.side,
                       correct = excluded.correct,
                       points_earned = excluded.points_earned,
                       updated_at = excluded.updated_at"#,
            )
            .bind(vote.id.to_string())
            .bind(player_id.to_string())
            .bind(poll_id.to_string())
            .bind(vote.slot as i64)
            .bind(vote.option_id.to_string())
            .bind(vote.side.map(|s| s.as_str()))
            .bind(vote.correct)
            .bind(vote.points_earned)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query("UPDATE players SET score = score + ?, updated_at = ? WHERE id = ?")
            .bind(score_delta)
            .bind(&now)
            .bind(player_id.to_string())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(DomainError::PlayerNotFound(player_id));
        }

        let (total,): (i64,) = sqlx::query_as("SELECT score FROM players WHERE id = ?")
            .bind(player_id.to_string())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(total)
    }

    async fn tally(&self, poll_id: Uuid) -> DomainResult<Vec<ConsensusCount>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"SELECT o.id, o.ordinal, COUNT(v.id)
               FROM poll_options o
               LEFT JOIN votes v ON v.option_id = o.id AND v.poll_id = o.poll_id
               WHERE o.poll_id = ?
               GROUP BY o.id, o.ordinal
               ORDER BY o.ordinal"#,
        )
        .bind(poll_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, ordinal, count)| {
                Ok(ConsensusCount {
                    option_id: parse_uuid(&id)?,
                    ordinal: ordinal as u32,
                    count: count as u64,
                })
            })
            .collect()
    }

    async fn history(&self, player_id: Uuid) -> DomainResult<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"SELECT v.id, v.player_id, v.poll_id, v.slot, v.option_id, v.side,
                      v.correct, v.points_earned, v.created_at, v.updated_at,
                      p.stage, p.level, p.ordinal
               FROM votes v
               JOIN polls p ON p.id = v.poll_id
               WHERE v.player_id = ?
               ORDER BY v.created_at, v.slot"#,
        )
        .bind(player_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistoryEntry::try_from).collect()
    }

    async fn level_history(
        &self,
        player_id: Uuid,
        stage: u32,
        level: u32,
    ) -> DomainResult<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"SELECT v.id, v.player_id, v.poll_id, v.slot, v.option_id, v.side,
                      v.correct, v.points_earned, v.created_at, v.updated_at,
                      p.stage, p.level, p.ordinal
               FROM votes v
               JOIN polls p ON p.id = v.poll_id
               WHERE v.player_id = ? AND p.stage = ? AND p.level = ?
               ORDER BY p.ordinal, v.slot"#,
        )
        .bind(player_id.to_string())
        .bind(stage as i64)
        .bind(level as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistoryEntry::try_from).collect()
    }

    async fn rows_at(
        &self,
        player_id: Uuid,
        stage: u32,
        level: u32,
        ordinal: u32,
    ) -> DomainResult<Vec<Vote>> {
        let rows: Vec<VoteRow> = sqlx::query_as(
            r#"SELECT v.* FROM votes v
               JOIN polls p ON p.id = v.poll_id
               WHERE v.player_id = ? AND p.stage = ? AND p.level = ? AND p.ordinal = ?
               ORDER BY v.slot"#,
        )
        .bind(player_id.to_string())
        .bind(stage as i64)
        .bind(level as i64)
        .bind(ordinal as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Vote::try_from).collect()
    }
}

fn parse_side_opt(raw: Option<String>) -> DomainResult<Option<Side>> {
    raw.map(|s| {
        Side::from_str(&s)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid side: {s}")))
    })
    .transpose()
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    id: String,
    player_id: String,
    poll_id: String,
    slot: i64,
    option_id: String,
    side: Option<String>,
    correct: bool,
    points_earned: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<VoteRow> for Vote {
    type Error = DomainError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        Ok(Vote {
            id: parse_uuid(&row.id)?,
            player_id: parse_uuid(&row.player_id)?,
            poll_id: parse_uuid(&row.poll_id)?,
            slot: row.slot as u32,
            option_id: parse_uuid(&row.option_id)?,
            side: parse_side_opt(row.side)?,
            correct: row.correct,
            points_earned: row.points_earned,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    player_id: String,
    poll_id: String,
    slot: i64,
    option_id: String,
    side: Option<String>,
    correct: bool,
    points_earned: i64,
    created_at: String,
    updated_at: String,
    stage: i64,
    level: i64,
    ordinal: i64,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let vote = Vote {
            id: parse_uuid(&row.id)?,
            player_id: parse_uuid(&row.player_id)?,
            poll_id: parse_uuid(&row.poll_id)?,
            slot: row.slot as u32,
            option_id: parse_uuid(&row.option_id)?,
            side: parse_side_opt(row.side)?,
            correct: row.correct,
            points_earned: row.points_earned,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        };
        Ok(HistoryEntry {
            vote,
            stage: row.stage as u32,
            level: row.level as u32,
            ordinal: row.ordinal as u32,
        })
    }
}
