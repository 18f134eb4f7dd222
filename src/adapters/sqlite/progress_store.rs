//! Durable ProgressStore backed by the SQLite repositories.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::parse_uuid;
use crate::adapters::sqlite::player_repository::SqlitePlayerRepository;
use crate::adapters::sqlite::vote_repository::SqliteVoteRepository;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CompletionKind, CompletionState, ConsensusBreakdown, ConsensusCount, HistoryEntry, Player,
    Position, Vote,
};
use crate::domain::ports::{
    ConsensusSettlement, PlayerRepository, ProgressStore, VoteRepository,
};

/// Store for a durable player identity. All state lives in SQLite and is
/// shared across sessions.
pub struct DurableProgressStore {
    player_id: Uuid,
    pool: SqlitePool,
    players: SqlitePlayerRepository,
    votes: SqliteVoteRepository,
}

impl DurableProgressStore {
    /// Open the store for a player, bootstrapping the row on first use.
    pub async fn open(pool: SqlitePool, player_id: Uuid) -> DomainResult<Self> {
        let players = SqlitePlayerRepository::new(pool.clone());
        players.ensure(player_id).await?;
        Ok(Self {
            player_id,
            votes: SqliteVoteRepository::new(pool.clone()),
            players,
            pool,
        })
    }

    async fn player(&self) -> DomainResult<Player> {
        self.players
            .get(self.player_id)
            .await?
            .ok_or(DomainError::PlayerNotFound(self.player_id))
    }
}

#[async_trait]
impl ProgressStore for DurableProgressStore {
    fn identity(&self) -> Uuid {
        self.player_id
    }

    fn is_durable(&self) -> bool {
        true
    }

    async fn position(&self) -> DomainResult<Position> {
        Ok(self.player().await?.position())
    }

    async fn set_position(&self, position: Position) -> DomainResult<()> {
        self.players.set_position(self.player_id, position).await
    }

    async fn score(&self) -> DomainResult<i64> {
        Ok(self.player().await?.score)
    }

    async fn rows_for_poll(&self, poll_id: Uuid) -> DomainResult<Vec<Vote>> {
        self.votes.rows_for_poll(self.player_id, poll_id).await
    }

    async fn settle(
        &self,
        poll_id: Uuid,
        entries: Vec<HistoryEntry>,
        delta: i64,
    ) -> DomainResult<i64> {
        let rows: Vec<Vote> = entries.into_iter().map(|e| e.vote).collect();
        self.votes.settle(self.player_id, poll_id, &rows, delta).await
    }

    async fn settle_consensus(
        &self,
        entry: HistoryEntry,
        base_points: i64,
    ) -> DomainResult<ConsensusSettlement> {
        let vote = &entry.vote;
        let poll_id = vote.poll_id;
        let now = Utc::now().to_rfc3339();

        // Write-first ordering: the upsert is the first statement, so the
        // transaction owns the write lock before the tally is read and two
        // concurrent voters cannot both observe a stale majority.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO votes (id, player_id, poll_id, slot, option_id, side,
               correct, points_earned, created_at, updated_at)
               VALUES (?, ?, ?, 0, ?, ?, 0, 0, ?, ?)
               ON CONFLICT(player_id, poll_id, slot) DO UPDATE SET
                   option_id = excluded.option_id,
                   updated_at = excluded.updated_at"#,
        )
        .bind(vote.id.to_string())
        .bind(self.player_id.to_string())
        .bind(poll_id.to_string())
        .bind(vote.option_id.to_string())
        .bind(vote.side.map(|s| s.as_str()))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        // The conflicting upsert left the previous judgment in place.
        let (previous_points,): (i64,) = sqlx::query_as(
            "SELECT points_earned FROM votes WHERE player_id = ? AND poll_id = ? AND slot = 0",
        )
        .bind(self.player_id.to_string())
        .bind(poll_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let count_rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"SELECT o.id, o.ordinal, COUNT(v.id)
               FROM poll_options o
               LEFT JOIN votes v ON v.option_id = o.id AND v.poll_id = o.poll_id
               WHERE o.poll_id = ?
               GROUP BY o.id, o.ordinal
               ORDER BY o.ordinal"#,
        )
        .bind(poll_id.to_string())
        .fetch_all(&mut *tx)
        .await?;

        let counts = count_rows
            .into_iter()
            .map(|(id, ordinal, count)| {
                Ok(ConsensusCount {
                    option_id: parse_uuid(&id)?,
                    ordinal: ordinal as u32,
                    count: count as u64,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let breakdown = ConsensusBreakdown::evaluate(counts, vote.option_id);
        let points = breakdown.points(base_points);
        let delta = points - previous_points;

        sqlx::query(
            r#"UPDATE votes SET correct = ?, points_earned = ?, updated_at = ?
               WHERE player_id = ? AND poll_id = ? AND slot = 0"#,
        )
        .bind(breakdown.aligned)
        .bind(points)
        .bind(&now)
        .bind(self.player_id.to_string())
        .bind(poll_id.to_string())
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE players SET score = score + ?, updated_at = ? WHERE id = ?",
        )
        .bind(delta)
        .bind(&now)
        .bind(self.player_id.to_string())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DomainError::PlayerNotFound(self.player_id));
        }

        let (total,): (i64,) = sqlx::query_as("SELECT score FROM players WHERE id = ?")
            .bind(self.player_id.to_string())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ConsensusSettlement { breakdown, points, delta, total })
    }

    async fn history(&self) -> DomainResult<Vec<HistoryEntry>> {
        self.votes.history(self.player_id).await
    }

    async fn level_history(&self, stage: u32, level: u32) -> DomainResult<Vec<HistoryEntry>> {
        self.votes.level_history(self.player_id, stage, level).await
    }

    async fn rows_at(&self, stage: u32, level: u32, ordinal: u32) -> DomainResult<Vec<Vote>> {
        self.votes.rows_at(self.player_id, stage, level, ordinal).await
    }

    async fn grant(
        &self,
        kind: CompletionKind,
        stage: u32,
        level: u32,
        bonus: i64,
    ) -> DomainResult<CompletionState> {
        self.players.grant(self.player_id, kind, stage, level, bonus).await
    }
}
