//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary HOME, so
//! the database and config never touch the real user directory.

use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_routinely"))
        .args(args)
        .env("HOME", home)
        .env_remove("ROUTINELY_ENV")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "CLI command failed: {args:?}\n{stderr}");
    stdout
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let stdout = run_cli_success(home, args);
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn add_routine(home: &Path, title: &str) -> String {
    let routine = run_json(home, &["routine", "add", title]);
    routine["id"].as_str().unwrap().to_string()
}

#[test]
fn test_routine_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let id = add_routine(home.path(), "Morning");

    run_json(home.path(), &["routine", "add-task", &id, "Stretch", "--seconds", "90"]);
    let routine = run_json(home.path(), &["routine", "add-task", &id, "Read", "--minutes", "10"]);
    assert_eq!(routine["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(routine["timer_enabled"], true);

    let shown = run_json(home.path(), &["routine", "show", &id]);
    assert_eq!(shown["total_duration_secs"], 690);
    assert!(shown["streak"].is_null());

    let list = run_json(home.path(), &["routine", "list"]);
    assert_eq!(list.as_array().unwrap().len(), 1);

    assert_eq!(run_cli_success(home.path(), &["routine", "delete", &id]).trim(), "ok");
    let (_, _, code) = run_cli(home.path(), &["routine", "show", &id]);
    assert_ne!(code, 0);
}

#[test]
fn test_streak_complete_and_saver() {
    let home = tempfile::tempdir().unwrap();
    let id = add_routine(home.path(), "Evening");

    let first = run_json(home.path(), &["streak", "complete", &id, "--date", "2024-03-01"]);
    assert_eq!(first["recorded"], true);
    assert_eq!(first["streak"]["current_streak"], 1);

    let again = run_json(home.path(), &["streak", "complete", &id, "--date", "2024-03-01"]);
    assert_eq!(again["recorded"], false);

    run_json(home.path(), &["streak", "complete", &id, "--date", "2024-03-02"]);
    let saver = run_json(home.path(), &["streak", "saver", &id, "--date", "2024-03-04"]);
    assert_eq!(saver["applied"], true);
    assert_eq!(saver["streak"]["last_completed_date"], "2024-03-03");

    let next = run_json(home.path(), &["streak", "complete", &id, "--date", "2024-03-04"]);
    assert_eq!(next["streak"]["current_streak"], 3);

    let status = run_json(home.path(), &["streak", "show", &id, "--date", "2024-03-04"]);
    assert_eq!(status["is_streak_active"], true);
    assert_eq!(status["completions"]["total"], 4);
    assert_eq!(status["completions"]["genuine"], 3);

    let history = run_json(home.path(), &["streak", "history", &id]);
    assert_eq!(history[0]["completed_date"], "2024-03-04");

    let calendar = run_json(home.path(), &["streak", "calendar", &id, "2024", "3"]);
    assert_eq!(calendar["completed_days"], 4);
    assert_eq!(calendar["streak_saver_days"], 1);
}

#[test]
fn test_streak_goal_validation() {
    let home = tempfile::tempdir().unwrap();
    let id = add_routine(home.path(), "Gym");

    let (_, stderr, code) = run_cli(home.path(), &["streak", "goal", &id, "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("positive"));

    let record = run_json(home.path(), &["streak", "goal", &id, "66"]);
    assert_eq!(record["streak_goal"], 66);
    assert!(record["last_completed_date"].is_null());

    let milestones = run_json(home.path(), &["streak", "milestones", &id]);
    assert_eq!(milestones["milestones"].as_array().unwrap().len(), 5);
    assert_eq!(milestones["next"]["days"], 7);
}

#[test]
fn test_invalid_calendar_month_fails() {
    let home = tempfile::tempdir().unwrap();
    let id = add_routine(home.path(), "Journal");
    let (_, _, code) = run_cli(home.path(), &["streak", "calendar", &id, "2024", "13"]);
    assert_ne!(code, 0);
}

#[test]
fn test_unknown_routine_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["streak", "complete", "missing"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_config_get_set_reset() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(
        run_cli_success(home.path(), &["config", "get", "streak.default_goal"]).trim(),
        "30"
    );
    run_cli_success(home.path(), &["config", "set", "timer.tick_ms", "250"]);
    assert_eq!(
        run_cli_success(home.path(), &["config", "get", "timer.tick_ms"]).trim(),
        "250"
    );

    let (_, _, code) = run_cli(home.path(), &["config", "set", "timer.bogus", "1"]);
    assert_ne!(code, 0);

    run_cli_success(home.path(), &["config", "reset"]);
    let list = run_json(home.path(), &["config", "list"]);
    assert_eq!(list["timer"]["tick_ms"], 1000);
}

#[test]
fn test_achievements_unlock_on_first_routine() {
    let home = tempfile::tempdir().unwrap();
    add_routine(home.path(), "Morning");

    let achievements = run_json(home.path(), &["achievements", "list"]);
    let entries = achievements.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    let first = entries.iter().find(|a| a["id"] == "first_routine").unwrap();
    assert_eq!(first["unlocked"], true);

    let check = run_json(home.path(), &["achievements", "check"]);
    assert!(check["unlocked"].as_array().unwrap().is_empty());
    assert_eq!(check["metrics"]["routines"], 1);
}

#[test]
fn test_timer_run_records_completion() {
    let home = tempfile::tempdir().unwrap();
    run_cli_success(home.path(), &["config", "set", "timer.tick_ms", "20"]);
    run_cli_success(home.path(), &["config", "set", "timer.poll_interval_ms", "5"]);

    let id = add_routine(home.path(), "Quick");
    run_json(home.path(), &["routine", "add-task", &id, "One", "--seconds", "2"]);
    run_json(home.path(), &["routine", "add-task", &id, "Two", "--seconds", "1"]);

    let stdout = run_cli_success(home.path(), &["timer", "run", &id]);
    let summary_start = stdout.find("{\n").expect("missing summary");
    let summary: Value = serde_json::from_str(&stdout[summary_start..]).unwrap();
    assert_eq!(summary["outcome"], "completed");
    assert_eq!(summary["completed_tasks"], 2);
    assert_eq!(summary["streak"]["current_streak"], 1);

    let metrics = run_json(home.path(), &["achievements", "check"]);
    assert_eq!(metrics["metrics"]["completed_tasks"], 2);
}
