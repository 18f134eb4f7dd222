//! Common test utilities for integration tests
//!
//! Provides the shared authored world plus store and service fixtures
//! used across multiple integration test files.

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use veer::adapters::sqlite::{
    create_migrated_test_pool, DurableProgressStore, SqliteConfigRepository, SqlitePollRepository,
};
use veer::domain::models::{Catalog, Poll};
use veer::domain::ports::PollRepository;
use veer::services::{CatalogImportService, SettlementService};

/// The authored world the integration tests play through.
///
/// Stage 0 is the guest calibration level. Stage 1 has two levels covering
/// every interaction kind; stage 2 exists so stage transitions have a
/// destination.
pub const WORLD: &str = r#"
polls:
  - stage: 0
    level: 1
    order: 1
    kind: binary_placement
    title: Warm-up sort
    instructions: Drag each card to the side it belongs on.
    feedback_correct: Both cards landed where they belong.
    feedback_incorrect: The cards are crossed.
    options:
      - content: Anecdote
        correct_side: left
      - content: Measurement
        correct_side: right
  - stage: 0
    level: 1
    order: 2
    kind: multi_choice
    title: Spot the tell
    feedback_correct: That detail gives it away.
    feedback_incorrect: That detail proves nothing.
    options:
      - content: The quoted sample size
        points: 30
        feedback: Sample size is the load-bearing detail.
      - content: The headline font
        points: 0
  - stage: 1
    level: 1
    order: 1
    kind: binary_placement
    title: Claims and evidence
    feedback_correct: Placed both claims where they belong.
    feedback_incorrect: The sides are crossed.
    options:
      - content: A testimonial from a forum
        correct_side: left
        points: 3
      - content: A dose-response measurement
        correct_side: right
        points: 3
  - stage: 1
    level: 1
    order: 2
    kind: multi_choice
    title: Pick the strongest source
    feedback_correct: Strong pick.
    feedback_incorrect: Weak pick.
    options:
      - content: A registered trial
        points: 5
        feedback: Registered trials carry the most weight here.
      - content: A celebrity endorsement
        points: 0
      - content: A forum thread
        points: 0
  - stage: 1
    level: 2
    order: 1
    kind: quad_grouping
    title: Group the tactics
    options:
      - content: Cherry-picked interval
        pairings:
          "1-2": { points: 8, feedback: Both tactics distort the axis. }
          "1-3": { points: 0 }
          "1-4": { points: 0 }
      - content: Truncated axis
      - content: Appeal to nature
      - content: Anonymous authority
  - stage: 1
    level: 2
    order: 2
    kind: consensus_vote
    title: Which tactic fools the most people?
    feedback_correct: Most players see it your way.
    feedback_incorrect: You broke from the crowd.
    options:
      - content: The distorted graph
        points: 4
      - content: The anonymous authority
  - stage: 2
    level: 1
    order: 1
    kind: binary_placement
    title: Deep-water sort
    options:
      - content: Relative risk
        correct_side: left
        points: 6
      - content: Absolute risk
        correct_side: right
        points: 6
levels:
  - stage: 0
    level: 1
    tiers:
      - min_score: 90
        label: A
        title: Sharp eye
        message: You read the room at a glance.
      - min_score: 70
        label: B
        title: Steady
        message: "Calibration put you at [[PointTotal]] points."
      - min_score: 0
        label: C
        title: Baseline
        message: Everyone starts somewhere.
  - stage: 1
    level: 1
    tiers:
      - min_score: 20
        label: A
        title: Front runner
        message: "[[PointTotal]] points and counting."
      - min_score: 10
        label: B
        title: On track
        message: Keep weighing the evidence.
      - min_score: 0
        label: C
        title: Finding footing
        message: The next level sharpens the same skill.
  - stage: 1
    level: 2
    show_interstitial: false
    tiers:
      - min_score: 0
        label: C
        title: Closed out
        message: Stage complete.
stages:
  - stage: 1
    completion_bonus: 40
    possible_points: 23
  - stage: 2
    completion_bonus: 0
    possible_points: 12
"#;

/// Create an in-memory database with the shared world imported.
#[allow(dead_code)]
pub async fn seeded_pool() -> SqlitePool {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test pool");
    let catalog = Catalog::from_yaml(WORLD).expect("world catalog should parse");
    CatalogImportService::new(
        Arc::new(SqlitePollRepository::new(pool.clone())),
        Arc::new(SqliteConfigRepository::new(pool.clone())),
    )
    .import(catalog)
    .await
    .expect("world catalog should import");
    pool
}

/// Load one world poll by its position.
#[allow(dead_code)]
pub async fn poll_at(pool: &SqlitePool, stage: u32, level: u32, order: u32) -> Poll {
    SqlitePollRepository::new(pool.clone())
        .get_by_position(stage, level, order)
        .await
        .expect("failed to load poll")
        .expect("world poll should exist")
}

/// Settlement service wired to the SQLite repositories.
#[allow(dead_code)]
pub fn settlement(
    pool: &SqlitePool,
) -> SettlementService<SqlitePollRepository, SqliteConfigRepository> {
    SettlementService::new(
        Arc::new(SqlitePollRepository::new(pool.clone())),
        Arc::new(SqliteConfigRepository::new(pool.clone())),
        &veer::domain::models::ScoringConfig::default(),
    )
}

/// Open a durable progress store for a fresh player.
#[allow(dead_code)]
pub async fn new_player(pool: &SqlitePool) -> DurableProgressStore {
    DurableProgressStore::open(pool.clone(), Uuid::new_v4())
        .await
        .expect("failed to open progress store")
}
