//! Player identities and the guest session counterpart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::outcome::CompletionKind;
use crate::domain::models::vote::Vote;

/// A (stage, level) progression pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Stage (0 = unauthenticated calibration)
    pub stage: u32,
    /// Level within the stage (1-based)
    pub level: u32,
}

impl Position {
    pub fn new(stage: u32, level: u32) -> Self {
        Self { stage, level }
    }

    /// The pointer every fresh identity starts at.
    pub fn start() -> Self {
        Self { stage: 0, level: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {} level {}", self.stage, self.level)
    }
}

/// A durable player identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier
    pub id: Uuid,
    /// Running score across all settled polls
    pub score: i64,
    /// Current stage
    pub stage: u32,
    /// Current level within the stage
    pub level: u32,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Player {
    /// A fresh identity at the starting pointer with zero score.
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        let start = Position::start();
        Self {
            id,
            score: 0,
            stage: start.stage,
            level: start.level,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.stage, self.level)
    }

    /// Set the progression pointer.
    pub fn with_position(mut self, position: Position) -> Self {
        self.stage = position.stage;
        self.level = position.level;
        self
    }

    /// Set the running score.
    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }
}

/// A settled vote joined with its poll's position, the shape history
/// queries return. Guest sessions store entries in this form directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The settled row
    pub vote: Vote,
    /// Stage of the voted poll
    pub stage: u32,
    /// Level of the voted poll
    pub level: u32,
    /// Order of the voted poll within its level
    pub ordinal: u32,
}

impl HistoryEntry {
    pub fn position(&self) -> Position {
        Position::new(self.stage, self.level)
    }
}

/// Key of a completion grant already credited to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantKey {
    /// Boundary kind
    pub kind: CompletionKind,
    /// Completed stage
    pub stage: u32,
    /// Completed level (0 for stage grants)
    pub level: u32,
}

/// Client-held state for an unauthenticated identity.
///
/// The whole session is the anonymous player's record: an ordered history of
/// settled entries (deduplicated per poll on resubmission), the progression
/// pointer and the running score. Serializes to an opaque token the
/// presentation layer hands back and forth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestSession {
    /// Session-local identity id
    pub id: Uuid,
    /// Progression pointer
    pub position: Position,
    /// Running score
    pub score: i64,
    /// Settled entries in settlement order
    pub entries: Vec<HistoryEntry>,
    /// Completion grants already credited within this session
    #[serde(default)]
    pub grants: Vec<GrantKey>,
}

impl GuestSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            position: Position::start(),
            score: 0,
            entries: Vec::new(),
            grants: Vec::new(),
        }
    }

    /// Record a completion grant. Returns false when the boundary was
    /// already granted, leaving the session unchanged.
    pub fn record_grant(&mut self, key: GrantKey) -> bool {
        if self.grants.contains(&key) {
            return false;
        }
        self.grants.push(key);
        true
    }

    /// Replace any previous entries for the poll with `entries` and credit
    /// the score delta. Mirrors the durable store's upsert-plus-delta
    /// settlement write.
    pub fn settle(&mut self, poll_id: Uuid, entries: Vec<HistoryEntry>, delta: i64) {
        self.entries.retain(|e| e.vote.poll_id != poll_id);
        self.entries.extend(entries);
        self.score += delta;
    }

    /// All entries recorded for one poll.
    pub fn entries_for_poll(&self, poll_id: Uuid) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.vote.poll_id == poll_id)
            .collect()
    }
}

impl Default for GuestSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(poll_id: Uuid, points: i64) -> HistoryEntry {
        let vote = Vote::new(Uuid::new_v4(), poll_id, 0, Uuid::new_v4())
            .with_outcome(points > 0, points);
        HistoryEntry { vote, stage: 0, level: 1, ordinal: 1 }
    }

    #[test]
    fn test_fresh_identities_start_at_stage_zero() {
        let player = Player::new(Uuid::new_v4());
        assert_eq!(player.position(), Position::start());
        assert_eq!(player.score, 0);

        let session = GuestSession::new();
        assert_eq!(session.position, Position::start());
        assert_eq!(session.score, 0);
    }

    #[test]
    fn test_guest_settle_replaces_per_poll() {
        let mut session = GuestSession::new();
        let poll = Uuid::new_v4();

        session.settle(poll, vec![entry(poll, 10)], 10);
        assert_eq!(session.score, 10);
        assert_eq!(session.entries.len(), 1);

        // Resubmission replaces the entry; the caller hands in the delta.
        session.settle(poll, vec![entry(poll, 4)], -6);
        assert_eq!(session.score, 4);
        assert_eq!(session.entries.len(), 1);
        assert_eq!(session.entries[0].vote.points_earned, 4);
    }

    #[test]
    fn test_guest_session_round_trips_as_token() {
        let mut session = GuestSession::new();
        let poll = Uuid::new_v4();
        session.settle(poll, vec![entry(poll, 2)], 2);
        session.record_grant(GrantKey { kind: CompletionKind::Level, stage: 0, level: 1 });

        let token = serde_json::to_string(&session).unwrap();
        let restored: GuestSession = serde_json::from_str(&token).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_record_grant_is_once_per_boundary() {
        let mut session = GuestSession::new();
        let key = GrantKey { kind: CompletionKind::Level, stage: 0, level: 1 };
        assert!(session.record_grant(key));
        assert!(!session.record_grant(key));
        assert_eq!(session.grants.len(), 1);
    }
}
