//! SQLite implementation of the PollRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PairingEntry, PairingMatrix, Poll, PollKind, PollOption, Side};
use crate::domain::ports::PollRepository;

#[derive(Clone)]
pub struct SqlitePollRepository {
    pool: SqlitePool,
}

impl SqlitePollRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_options(&self, poll: &mut Poll) -> DomainResult<()> {
        let rows: Vec<OptionRow> = sqlx::query_as(
            "SELECT * FROM poll_options WHERE poll_id = ? ORDER BY ordinal",
        )
        .bind(poll.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        poll.options = rows
            .into_iter()
            .map(PollOption::try_from)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(())
    }

    async fn hydrate(&self, row: PollRow) -> DomainResult<Poll> {
        let mut poll = Poll::try_from(row)?;
        self.load_options(&mut poll).await?;
        Ok(poll)
    }
}

#[async_trait]
impl PollRepository for SqlitePollRepository {
    async fn store(&self, poll: &Poll) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO polls (id, stage, level, ordinal, kind, title, instructions,
               feedback_correct, feedback_incorrect, overlay_caption, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(stage, level, ordinal) DO UPDATE SET
                   kind = excluded.kind,
                   title = excluded.title,
                   instructions = excluded.instructions,
                   feedback_correct = excluded.feedback_correct,
                   feedback_incorrect = excluded.feedback_incorrect,
                   overlay_caption = excluded.overlay_caption,
                   updated_at = excluded.updated_at"#,
        )
        .bind(poll.id.to_string())
        .bind(poll.stage as i64)
        .bind(poll.level as i64)
        .bind(poll.ordinal as i64)
        .bind(poll.kind.as_str())
        .bind(&poll.title)
        .bind(&poll.instructions)
        .bind(&poll.feedback_correct)
        .bind(&poll.feedback_incorrect)
        .bind(&poll.overlay_caption)
        .bind(poll.created_at.to_rfc3339())
        .bind(poll.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // Re-import keeps the row id already at this position so votes
        // stay attached.
        let (canonical_id,): (String,) = sqlx::query_as(
            "SELECT id FROM polls WHERE stage = ? AND level = ? AND ordinal = ?",
        )
        .bind(poll.stage as i64)
        .bind(poll.level as i64)
        .bind(poll.ordinal as i64)
        .fetch_one(&mut *tx)
        .await?;

        for option in &poll.options {
            let pairing_json = option
                .pairing
                .as_ref()
                .map(|p| serde_json::to_string(&p.to_raw()))
                .transpose()?;

            sqlx::query(
                r#"INSERT INTO poll_options (id, poll_id, ordinal, content, correct_side,
                   points, pairing_scores, feedback)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(poll_id, ordinal) DO UPDATE SET
                       content = excluded.content,
                       correct_side = excluded.correct_side,
                       points = excluded.points,
                       pairing_scores = excluded.pairing_scores,
                       feedback = excluded.feedback"#,
            )
            .bind(option.id.to_string())
            .bind(&canonical_id)
            .bind(option.ordinal as i64)
            .bind(&option.content)
            .bind(option.correct_side.map(|s| s.as_str()))
            .bind(option.points)
            .bind(&pairing_json)
            .bind(&option.feedback)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM poll_options WHERE poll_id = ? AND ordinal > ?")
            .bind(&canonical_id)
            .bind(poll.options.len() as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Poll>> {
        let row: Option<PollRow> = sqlx::query_as("SELECT * FROM polls WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_position(
        &self,
        stage: u32,
        level: u32,
        ordinal: u32,
    ) -> DomainResult<Option<Poll>> {
        let row: Option<PollRow> = sqlx::query_as(
            "SELECT * FROM polls WHERE stage = ? AND level = ? AND ordinal = ?",
        )
        .bind(stage as i64)
        .bind(level as i64)
        .bind(ordinal as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn list_level(&self, stage: u32, level: u32) -> DomainResult<Vec<Poll>> {
        let rows: Vec<PollRow> = sqlx::query_as(
            "SELECT * FROM polls WHERE stage = ? AND level = ? ORDER BY ordinal",
        )
        .bind(stage as i64)
        .bind(level as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut polls = Vec::with_capacity(rows.len());
        for row in rows {
            polls.push(self.hydrate(row).await?);
        }
        Ok(polls)
    }

    async fn levels_in_stage(&self, stage: u32) -> DomainResult<Vec<u32>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT level FROM polls WHERE stage = ? ORDER BY level",
        )
        .bind(stage as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(l,)| l as u32).collect())
    }

    async fn stages(&self) -> DomainResult<Vec<u32>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT DISTINCT stage FROM polls ORDER BY stage")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(s,)| s as u32).collect())
    }
}

#[derive(sqlx::FromRow)]
struct PollRow {
    id: String,
    stage: i64,
    level: i64,
    ordinal: i64,
    kind: String,
    title: String,
    instructions: String,
    feedback_correct: String,
    feedback_incorrect: String,
    overlay_caption: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PollRow> for Poll {
    type Error = DomainError;

    fn try_from(row: PollRow) -> Result<Self, Self::Error> {
        let kind = PollKind::from_str(&row.kind).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid poll kind: {}", row.kind))
        })?;

        Ok(Poll {
            id: parse_uuid(&row.id)?,
            stage: row.stage as u32,
            level: row.level as u32,
            ordinal: row.ordinal as u32,
            kind,
            title: row.title,
            instructions: row.instructions,
            feedback_correct: row.feedback_correct,
            feedback_incorrect: row.feedback_incorrect,
            overlay_caption: row.overlay_caption,
            options: Vec::new(),
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: String,
    poll_id: String,
    ordinal: i64,
    content: String,
    correct_side: Option<String>,
    points: Option<i64>,
    pairing_scores: Option<String>,
    feedback: Option<String>,
}

impl TryFrom<OptionRow> for PollOption {
    type Error = DomainError;

    fn try_from(row: OptionRow) -> Result<Self, Self::Error> {
        let correct_side = row
            .correct_side
            .map(|s| {
                Side::from_str(&s).ok_or_else(|| {
                    DomainError::SerializationError(format!("Invalid side: {s}"))
                })
            })
            .transpose()?;

        let pairing = row
            .pairing_scores
            .map(|json| {
                let raw: HashMap<String, PairingEntry> = serde_json::from_str(&json)?;
                PairingMatrix::from_raw(&raw)
            })
            .transpose()?;

        Ok(PollOption {
            id: parse_uuid(&row.id)?,
            poll_id: parse_uuid(&row.poll_id)?,
            ordinal: row.ordinal as u32,
            content: row.content,
            correct_side,
            points: row.points,
            pairing,
            feedback: row.feedback,
        })
    }
}
