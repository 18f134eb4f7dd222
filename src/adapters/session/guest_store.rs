//! Client-held ProgressStore for unauthenticated identities.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CompletionKind, CompletionState, ConsensusBreakdown, ConsensusCount, GrantKey, GuestSession,
    HistoryEntry, Position, Vote,
};
use crate::domain::ports::{ConsensusSettlement, ProgressStore, VoteRepository};

/// Store whose entire state lives in a [`GuestSession`] the caller holds.
///
/// Nothing a guest does is written to shared storage. Consensus polls are
/// the one place guests touch the shared world at all, and only to read
/// the durable tally their vote is judged against.
pub struct GuestProgressStore {
    identity: Uuid,
    session: Mutex<GuestSession>,
    tally: Arc<dyn VoteRepository>,
}

impl GuestProgressStore {
    /// Start a fresh session at stage 0, level 1.
    pub fn new(tally: Arc<dyn VoteRepository>) -> Self {
        Self::resume(GuestSession::new(), tally)
    }

    /// Resume a session handed back by the client.
    pub fn resume(session: GuestSession, tally: Arc<dyn VoteRepository>) -> Self {
        Self {
            identity: session.id,
            session: Mutex::new(session),
            tally,
        }
    }

    /// Snapshot the session for the client to carry to the next request.
    pub async fn snapshot(&self) -> GuestSession {
        self.session.lock().await.clone()
    }
}

#[async_trait]
impl ProgressStore for GuestProgressStore {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn position(&self) -> DomainResult<Position> {
        Ok(self.session.lock().await.position)
    }

    async fn set_position(&self, position: Position) -> DomainResult<()> {
        self.session.lock().await.position = position;
        Ok(())
    }

    async fn score(&self) -> DomainResult<i64> {
        Ok(self.session.lock().await.score)
    }

    async fn rows_for_poll(&self, poll_id: Uuid) -> DomainResult<Vec<Vote>> {
        let session = self.session.lock().await;
        Ok(session
            .entries_for_poll(poll_id)
            .into_iter()
            .map(|e| e.vote.clone())
            .collect())
    }

    async fn settle(
        &self,
        poll_id: Uuid,
        entries: Vec<HistoryEntry>,
        delta: i64,
    ) -> DomainResult<i64> {
        let mut session = self.session.lock().await;
        session.settle(poll_id, entries, delta);
        Ok(session.score)
    }

    async fn settle_consensus(
        &self,
        mut entry: HistoryEntry,
        base_points: i64,
    ) -> DomainResult<ConsensusSettlement> {
        let poll_id = entry.vote.poll_id;
        let chosen = entry.vote.option_id;

        // Read the durable tally and fold this vote in locally. Guests were
        // never persisted, so a re-vote cannot double-count.
        let mut counts = self.tally.tally(poll_id).await?;
        match counts.iter_mut().find(|c| c.option_id == chosen) {
            Some(count) => count.count += 1,
            None => counts.push(ConsensusCount {
                option_id: chosen,
                ordinal: 0,
                count: 1,
            }),
        }

        let breakdown = ConsensusBreakdown::evaluate(counts, chosen);
        let points = breakdown.points(base_points);
        entry.vote = entry.vote.clone().with_outcome(breakdown.aligned, points);

        let mut session = self.session.lock().await;
        let previous: i64 = session
            .entries_for_poll(poll_id)
            .first()
            .map_or(0, |e| e.vote.points_earned);
        let delta = points - previous;
        session.settle(poll_id, vec![entry], delta);

        Ok(ConsensusSettlement {
            breakdown,
            points,
            delta,
            total: session.score,
        })
    }

    async fn history(&self) -> DomainResult<Vec<HistoryEntry>> {
        Ok(self.session.lock().await.entries.clone())
    }

    async fn level_history(&self, stage: u32, level: u32) -> DomainResult<Vec<HistoryEntry>> {
        let session = self.session.lock().await;
        let mut entries: Vec<HistoryEntry> = session
            .entries
            .iter()
            .filter(|e| e.stage == stage && e.level == level)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.ordinal, e.vote.slot));
        Ok(entries)
    }

    async fn rows_at(&self, stage: u32, level: u32, ordinal: u32) -> DomainResult<Vec<Vote>> {
        let session = self.session.lock().await;
        let mut rows: Vec<Vote> = session
            .entries
            .iter()
            .filter(|e| e.stage == stage && e.level == level && e.ordinal == ordinal)
            .map(|e| e.vote.clone())
            .collect();
        rows.sort_by_key(|v| v.slot);
        Ok(rows)
    }

    async fn grant(
        &self,
        kind: CompletionKind,
        stage: u32,
        level: u32,
        bonus: i64,
    ) -> DomainResult<CompletionState> {
        let mut session = self.session.lock().await;
        if session.record_grant(GrantKey { kind, stage, level }) {
            session.score += bonus;
            Ok(CompletionState::JustCompleted)
        } else {
            Ok(CompletionState::AlreadyComplete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, DurableProgressStore, SqlitePollRepository,
        SqliteVoteRepository,
    };
    use crate::domain::models::{Poll, PollKind, PollOption};
    use crate::domain::ports::PollRepository;

    fn entry(poll: &Poll, player: Uuid, option: Uuid, points: i64) -> HistoryEntry {
        HistoryEntry {
            vote: Vote::new(player, poll.id, 0, option).with_outcome(points > 0, points),
            stage: poll.stage,
            level: poll.level,
            ordinal: poll.ordinal,
        }
    }

    async fn seed_consensus_poll(pool: &sqlx::SqlitePool) -> Poll {
        let mut poll = Poll::new(1, 1, 1, PollKind::ConsensusVote, "Pick a side");
        let id = poll.id;
        poll = poll
            .with_option(PollOption::new(id, 1, "North"))
            .with_option(PollOption::new(id, 2, "South"));
        SqlitePollRepository::new(pool.clone()).store(&poll).await.unwrap();
        poll
    }

    #[tokio::test]
    async fn test_guest_state_never_reaches_shared_storage() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_consensus_poll(&pool).await;
        let votes = Arc::new(SqliteVoteRepository::new(pool.clone()));

        let guest = GuestProgressStore::new(votes.clone());
        let settled = guest
            .settle_consensus(entry(&poll, guest.identity(), poll.options[0].id, 0), 10)
            .await
            .unwrap();
        assert!(settled.breakdown.aligned);
        assert_eq!(settled.points, 10);

        // The shared tally is still empty.
        let shared = votes.tally(poll.id).await.unwrap();
        assert!(shared.iter().all(|c| c.count == 0));
    }

    #[tokio::test]
    async fn test_guest_consensus_reads_durable_tally() {
        let pool = create_migrated_test_pool().await.unwrap();
        let poll = seed_consensus_poll(&pool).await;

        // Two durable voters pick option 1.
        for _ in 0..2 {
            let durable = DurableProgressStore::open(pool.clone(), Uuid::new_v4())
                .await
                .unwrap();
            durable
                .settle_consensus(entry(&poll, durable.identity(), poll.options[0].id, 0), 10)
                .await
                .unwrap();
        }

        let votes = Arc::new(SqliteVoteRepository::new(pool.clone()));
        let guest = GuestProgressStore::new(votes);
        let settled = guest
            .settle_consensus(entry(&poll, guest.identity(), poll.options[1].id, 0), 10)
            .await
            .unwrap();

        // 2 against 1: the guest sits in the minority.
        assert!(!settled.breakdown.aligned);
        assert_eq!(settled.points, 0);
        assert_eq!(settled.breakdown.total, 3);
    }

    #[tokio::test]
    async fn test_guest_session_round_trip_preserves_progress() {
        let pool = create_migrated_test_pool().await.unwrap();
        let votes = Arc::new(SqliteVoteRepository::new(pool.clone()));
        let poll_id = Uuid::new_v4();

        let guest = GuestProgressStore::new(votes.clone());
        let e = HistoryEntry {
            vote: Vote::new(guest.identity(), poll_id, 0, Uuid::new_v4()).with_outcome(true, 6),
            stage: 0,
            level: 1,
            ordinal: 2,
        };
        guest.settle(poll_id, vec![e], 6).await.unwrap();
        guest.set_position(Position::new(0, 2)).await.unwrap();

        let token = guest.snapshot().await;
        let resumed = GuestProgressStore::resume(token, votes);
        assert_eq!(resumed.identity(), guest.identity());
        assert_eq!(resumed.score().await.unwrap(), 6);
        assert_eq!(resumed.position().await.unwrap(), Position::new(0, 2));
        assert_eq!(resumed.rows_at(0, 1, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guest_grant_credits_once() {
        let pool = create_migrated_test_pool().await.unwrap();
        let votes = Arc::new(SqliteVoteRepository::new(pool.clone()));
        let guest = GuestProgressStore::new(votes);

        let first = guest.grant(CompletionKind::Level, 1, 1, 50).await.unwrap();
        assert_eq!(first, CompletionState::JustCompleted);
        assert_eq!(guest.score().await.unwrap(), 50);

        let second = guest.grant(CompletionKind::Level, 1, 1, 50).await.unwrap();
        assert_eq!(second, CompletionState::AlreadyComplete);
        assert_eq!(guest.score().await.unwrap(), 50);
    }
}
