//! End-to-end tests that invoke the compiled `plinth` binary.

use assert_cmd::Command;
use plinth_test_utils::{TestRepo, catalog};
use predicates::prelude::*;

/// Get a Command for the plinth binary, isolated from the caller's settings.
fn plinth(repo: &TestRepo) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("plinth"));
    cmd.current_dir(repo.root())
        .env_remove("PLINTH_MANIFEST")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn help_lists_commands() {
    let repo = TestRepo::new();
    plinth(&repo)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("validate-manifest"));
}

#[test]
fn no_command_shows_help_hint() {
    let repo = TestRepo::new();
    plinth(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("plinth --help"));
}

#[test]
fn completions_are_generated() {
    let repo = TestRepo::new();
    plinth(&repo)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plinth"));
}

// ============================================================================
// install
// ============================================================================

#[test]
fn install_standard_scenario() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "foundation", "lang-python", "std-security", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All plugins installed"));

    repo.assert_file_contains(".python-version", "3.12");
    repo.assert_file_contains(".gitignore", "plinth:std-security");
}

#[test]
fn second_install_makes_no_changes() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "lang-python", "--yes"])
        .assert()
        .success();

    plinth(&repo)
        .args(["install", "lang-python", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 step(s) run, 0 change(s) made"));
}

#[test]
fn marker_file_skips_foundation() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    repo.write_file(".plinth-foundation", "installed\n");

    plinth(&repo)
        .args(["install", "foundation", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 step(s) run"));
    repo.assert_file_not_exists(".editorconfig");
}

#[test]
fn option_flag_sets_value() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "lang-python", "-o", "python_version=3.11", "--yes"])
        .assert()
        .success();
    repo.assert_file_contains(".python-version", "3.11");
}

#[test]
fn invalid_option_exits_one() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "lang-python", "-o", "python_version=2.7", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("2.7"));
    repo.assert_file_not_exists(".python-version");
}

#[test]
fn unknown_plugin_exits_one() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "ghost", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn conflict_exits_one_without_changes() {
    let repo = TestRepo::with_manifest(catalog::CONFLICTING);
    plinth(&repo)
        .args(["install", "style-a", "style-b", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("style-a"))
        .stderr(predicate::str::contains("style-b"))
        .stderr(predicate::str::contains(".editorconfig"));
    repo.assert_file_not_exists(".editorconfig");
}

#[test]
fn dry_run_prints_plan() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "std-security", "--dry-run", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("foundation"))
        .stdout(predicate::str::contains("std-security"))
        .stdout(predicate::str::contains("Dry run"));
    repo.assert_file_not_exists(".plinth");
}

#[test]
fn missing_manifest_exits_one_with_hint() {
    let repo = TestRepo::new();
    plinth(&repo)
        .args(["install", "foundation", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("hint"));
}

#[test]
fn manifest_flag_and_env_are_honoured() {
    let repo = TestRepo::new();
    repo.write_file("catalogs/tooling.toml", catalog::STANDARD);

    plinth(&repo)
        .args(["--manifest", "catalogs/tooling.toml", "install", "foundation", "--yes"])
        .assert()
        .success();
    repo.assert_file_exists(".plinth-foundation");

    plinth(&repo)
        .env("PLINTH_MANIFEST", repo.path("catalogs/tooling.toml"))
        .args(["install", "lang-python", "--yes"])
        .assert()
        .success();
    repo.assert_file_exists(".python-version");

    // Later runs fall back to the manifest recorded in progress.
    plinth(&repo).args(["status"]).assert().success();
}

#[test]
fn repo_flag_targets_another_directory() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    let elsewhere = TestRepo::new();
    plinth(&elsewhere)
        .args(["install", "foundation", "--yes", "--repo"])
        .arg(repo.root())
        .assert()
        .success();
    repo.assert_file_exists(".editorconfig");
}

// ============================================================================
// resume and partial failure
// ============================================================================

#[cfg(unix)]
#[test]
fn failure_exits_two_and_resume_finishes() {
    let repo = TestRepo::with_manifest(catalog::FLAKY);
    plinth(&repo)
        .args(["install", "flaky", "--yes"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("plinth resume"));

    repo.write_file("go", "");
    plinth(&repo).arg("resume").assert().success();
    assert_eq!(repo.read_file("counter"), "first\nsecond\nsecond\n");
}

#[cfg(unix)]
#[test]
fn blocked_dependent_exits_two() {
    let repo = TestRepo::with_manifest(catalog::FAILING_DEPENDENCY);
    plinth(&repo)
        .args(["install", "app", "--yes"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("blocked by 'base'"));
}

// ============================================================================
// status and validate-manifest
// ============================================================================

#[test]
fn status_json_lists_plugins() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["install", "foundation", "--yes"])
        .assert()
        .success();

    let output = plinth(&repo)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["plugin_id"], "foundation");
    assert_eq!(rows[0]["status"], "complete");
    assert_eq!(rows[0]["detected"], "installed");
    assert_eq!(rows[1]["status"], "not_started");
}

#[test]
fn validate_manifest_accepts_valid_catalog() {
    let repo = TestRepo::with_manifest(catalog::STANDARD);
    plinth(&repo)
        .args(["validate-manifest", "plinth.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 plugin(s)"));
}

#[test]
fn validate_manifest_reports_cycle() {
    let repo = TestRepo::with_manifest(catalog::CYCLIC);
    plinth(&repo)
        .args(["validate-manifest", "plinth.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("a -> b -> c -> a"));
}
