//! CLI integration tests for the veer binary.
//! Runs each command end to end against a project initialized in a
//! temporary directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ============================================================
// Helper functions
// ============================================================

/// A one-poll calibration world, small enough to assert every number.
/// The binary poll carries no authored points, so settlement falls back
/// to the positional default of 2.
const CATALOG: &str = r#"
polls:
  - stage: 0
    level: 1
    order: 1
    kind: binary_placement
    title: Calibration sort
    feedback_correct: Both cards are home.
    feedback_incorrect: The cards are crossed.
    options:
      - content: Gut feeling
        correct_side: left
      - content: Row of numbers
        correct_side: right
levels:
  - stage: 0
    level: 1
    tiers:
      - min_score: 90
        label: A
        title: Sharp
        message: Calibrated on the first pass.
      - min_score: 70
        label: B
        title: Steady
        message: Mostly calibrated.
      - min_score: 0
        label: C
        title: Baseline
        message: Everyone starts somewhere.
"#;

/// Extension trait to assert command succeeded without warnings on stderr.
trait AssertExt {
    fn success_without_warnings(self) -> Self;
}

impl AssertExt for assert_cmd::assert::Assert {
    fn success_without_warnings(self) -> Self {
        self.success()
            .stderr(predicates::str::contains("WARN").not())
    }
}

/// Build an `assert_cmd::Command` pointing at the `veer` binary,
/// with its working directory set to `dir`.
fn veer_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("veer").expect("veer binary should build");
    cmd.current_dir(dir);
    cmd
}

/// Run `veer init` in the given directory so that subsequent commands
/// have a database and project structure to work with.
fn init_project(dir: &Path) {
    veer_cmd(dir)
        .args(["init"])
        .assert()
        .success_without_warnings();
}

/// Initialize a project and import the one-poll calibration world.
fn setup_world(dir: &Path) {
    init_project(dir);
    let catalog_path = dir.join("catalog.yaml");
    std::fs::write(&catalog_path, CATALOG).expect("should write catalog file");
    veer_cmd(dir)
        .args(["import", "catalog.yaml"])
        .assert()
        .success_without_warnings();
}

/// Run a command with `--json`, assert success, and return the parsed
/// JSON value from stdout.
fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = veer_cmd(dir)
        .args(args)
        .assert()
        .success_without_warnings()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output)
        .unwrap_or_else(|e| panic!("Failed to parse JSON from {args:?}: {e}"))
}

// ============================================================
// init
// ============================================================

#[test]
fn test_init_creates_project_structure() {
    let temp = TempDir::new().unwrap();
    let result = run_json(temp.path(), &["init", "--json"]);

    assert_eq!(result["success"], true);
    assert_eq!(result["config_written"], true);
    assert_eq!(result["database_initialized"], true);
    assert!(temp.path().join(".veer/config.yaml").exists());
    assert!(temp.path().join(".veer/veer.db").exists());
}

#[test]
fn test_init_refuses_to_clobber_without_force() {
    let temp = TempDir::new().unwrap();
    init_project(temp.path());

    let result = run_json(temp.path(), &["init", "--json"]);
    assert_eq!(result["success"], false);
    assert!(result["message"]
        .as_str()
        .unwrap()
        .contains("--force"));

    let result = run_json(temp.path(), &["init", "--force", "--json"]);
    assert_eq!(result["success"], true);
    assert!(temp.path().join(".veer/veer.db").exists());
}

// ============================================================
// import
// ============================================================

#[test]
fn test_import_reports_catalog_counts() {
    let temp = TempDir::new().unwrap();
    init_project(temp.path());
    std::fs::write(temp.path().join("catalog.yaml"), CATALOG).unwrap();

    let result = run_json(temp.path(), &["import", "catalog.yaml", "--json"]);
    assert_eq!(result["success"], true);
    assert_eq!(result["polls"], 1);
    assert_eq!(result["levels"], 1);
    assert_eq!(result["stages"], 0);
}

#[test]
fn test_import_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    init_project(temp.path());

    veer_cmd(temp.path())
        .args(["import", "nonexistent.yaml"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("nonexistent.yaml"));
}

// ============================================================
// vote
// ============================================================

#[test]
fn test_guest_vote_settles_and_completes_the_level() {
    let temp = TempDir::new().unwrap();
    setup_world(temp.path());

    let result = run_json(
        temp.path(),
        &[
            "vote", "--stage", "0", "--level", "1", "--order", "1", "--side", "left", "--json",
        ],
    );

    assert_eq!(result["success"], true);
    assert_eq!(result["correct"], true);
    assert_eq!(result["points_earned"], 2);
    assert_eq!(result["score_delta"], 2);
    assert_eq!(result["total_score"], 2);
    assert_eq!(result["feedback"], "Both cards are home.");

    // The single poll is the whole level, so the settlement closes it.
    let completion = &result["completion"];
    assert_eq!(completion["total_votes"], 1);
    assert_eq!(completion["correct_votes"], 1);
    assert_eq!(completion["dq"], 0.0);
    assert_eq!(completion["points_earned"], 2);
    assert_eq!(completion["bonus"], 0);
    assert_eq!(completion["stage_bonus"], 0);
    assert_eq!(completion["level_up"], false);
    assert_eq!(completion["next"]["stage"], 0);
    assert_eq!(completion["next"]["level"], 1);
    assert_eq!(completion["show_interstitial"], true);

    // Calibration awareness of 52 pins the band to C.
    assert_eq!(completion["tier"]["label"], "C");
    assert_eq!(completion["tier"]["title"], "Baseline");
    assert_eq!(completion["tier"]["message"], "Everyone starts somewhere.");

    // The guest session token was written next to the database.
    assert!(temp.path().join(".veer/session.json").exists());
}

#[test]
fn test_vote_human_output_reports_the_judgment() {
    let temp = TempDir::new().unwrap();
    setup_world(temp.path());

    veer_cmd(temp.path())
        .args([
            "vote", "--stage", "0", "--level", "1", "--order", "1", "--side", "right",
        ])
        .assert()
        .success_without_warnings()
        .stdout(predicates::str::contains("Incorrect: 0 point(s) earned"))
        .stdout(predicates::str::contains("The cards are crossed."));
}

#[test]
fn test_vote_with_unknown_poll_prefix_fails() {
    let temp = TempDir::new().unwrap();
    setup_world(temp.path());

    veer_cmd(temp.path())
        .args(["vote", "--poll", "zzzz", "--side", "left"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("zzzz"));
}

// ============================================================
// progress and metrics
// ============================================================

#[test]
fn test_progress_reflects_the_guest_session() {
    let temp = TempDir::new().unwrap();
    setup_world(temp.path());
    run_json(
        temp.path(),
        &[
            "vote", "--stage", "0", "--level", "1", "--order", "1", "--side", "left", "--json",
        ],
    );

    let result = run_json(temp.path(), &["progress", "--json"]);
    assert_eq!(result["durable"], false);
    assert_eq!(result["stage"], 0);
    assert_eq!(result["level"], 1);
    assert_eq!(result["score"], 2);
    assert_eq!(result["answered_in_level"], 1);
    assert_eq!(result["polls_in_level"], 1);
}

#[test]
fn test_metrics_uses_the_calibration_formula() {
    let temp = TempDir::new().unwrap();
    setup_world(temp.path());
    run_json(
        temp.path(),
        &[
            "vote", "--stage", "0", "--level", "1", "--order", "1", "--side", "left", "--json",
        ],
    );

    let result = run_json(temp.path(), &["metrics", "--json"]);
    assert_eq!(result["raw_score"], 2);
    assert_eq!(result["awareness"], 52);
    assert_eq!(result["deviance"], 0.0);
    assert_eq!(result["level_points"], 2);
}

// ============================================================
// player
// ============================================================

#[test]
fn test_player_new_then_vote_is_durable() {
    let temp = TempDir::new().unwrap();
    setup_world(temp.path());

    let created = run_json(temp.path(), &["player", "new", "--json"]);
    let id = created["id"].as_str().expect("player id").to_string();

    let result = run_json(
        temp.path(),
        &[
            "vote", "--stage", "0", "--level", "1", "--order", "1", "--side", "left", "--player",
            &id, "--json",
        ],
    );
    assert_eq!(result["success"], true);

    let progress = run_json(temp.path(), &["progress", "--player", &id, "--json"]);
    assert_eq!(progress["durable"], true);
    assert_eq!(progress["score"], 2);
}
