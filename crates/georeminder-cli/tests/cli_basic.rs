//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test gets
//! its own GEOREMINDER_HOME so they never share a database or config file.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    run_cli_with_stdin(home, args, None)
}

fn run_cli_with_stdin(home: &Path, args: &[&str], stdin: Option<&str>) -> (i32, String, String) {
    let mut child = Command::new("cargo")
        .args(["run", "-q", "-p", "georeminder-cli", "--"])
        .args(args)
        .env("GEOREMINDER_HOME", home)
        .env_remove("GEOREMINDER_ENV")
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");

    if let Some(input) = stdin {
        let mut pipe = child.stdin.take().expect("stdin piped");
        pipe.write_all(input.as_bytes()).expect("write stdin");
    }

    let output = child.wait_with_output().expect("CLI did not finish");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReminderOut {
    id: String,
    title: String,
    status: String,
    radius_meters: f64,
    triggered_at: Option<i64>,
}

/// `reminder add` prints a header line followed by pretty JSON.
fn add_reminder(home: &Path, args: &[&str]) -> ReminderOut {
    let mut full = vec!["reminder", "add"];
    full.extend_from_slice(args);
    let (code, stdout, stderr) = run_cli(home, &full);
    assert_eq!(code, 0, "reminder add failed: {stderr}");
    let json = stdout
        .split_once('\n')
        .map(|(_, rest)| rest)
        .expect("header line");
    serde_json::from_str(json).expect("reminder JSON")
}

fn list(home: &Path, extra: &[&str]) -> Vec<ReminderOut> {
    let mut args = vec!["reminder", "list"];
    args.extend_from_slice(extra);
    let (code, stdout, stderr) = run_cli(home, &args);
    assert_eq!(code, 0, "reminder list failed: {stderr}");
    serde_json::from_str(&stdout).expect("list JSON")
}

#[test]
fn test_reminder_lifecycle() {
    let home = tempfile::tempdir().unwrap();

    let added = add_reminder(
        home.path(),
        &["Bakery", "--notes", "sourdough", "--lat", "51.5", "--lng", "-0.12"],
    );
    assert_eq!(added.title, "Bakery");
    assert_eq!(added.status, "active");
    assert_eq!(added.radius_meters, 200.0);

    let all = list(home.path(), &[]);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, added.id);

    let (code, stdout, _) = run_cli(home.path(), &["reminder", "complete", &added.id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Reminder completed"));
    assert!(list(home.path(), &["--status", "active"]).is_empty());
    assert_eq!(list(home.path(), &["--status", "completed"]).len(), 1);

    let (code, _, stderr) = run_cli(home.path(), &["reminder", "complete", &added.id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));

    let (code, stdout, _) = run_cli(home.path(), &["reminder", "remove", &added.id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Reminder removed"));
    let (code, stdout, _) = run_cli(home.path(), &["reminder", "remove", &added.id]);
    assert_eq!(code, 0, "removing twice is not an error");
    assert!(stdout.contains("No reminder"));
}

#[test]
fn test_reminder_add_rejects_bad_coordinates() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        home.path(),
        &["reminder", "add", "Nowhere", "--lat", "95", "--lng", "0"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("out of range"));
}

#[test]
fn test_reminder_suggest() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(
        home.path(),
        &["reminder", "suggest", "buy milk when I pass the corner shop"],
    );
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["title"], "Buy milk");
}

#[test]
fn test_distance() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["distance", "0", "0", "0", "0.0009", "--format"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "100m");

    let (code, stdout, _) = run_cli(home.path(), &["distance", "48.8566", "2.3522", "51.5074", "-0.1278"]);
    assert_eq!(code, 0);
    let meters: f64 = stdout.trim().parse().unwrap();
    assert!((meters - 343_550.0).abs() < 1_000.0);
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "tracking.timeout_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "10000");

    let (code, _, _) = run_cli(home.path(), &["config", "set", "reminders.default_radius_meters", "75"]);
    assert_eq!(code, 0);
    let added = add_reminder(home.path(), &["Gym", "--lat", "1", "--lng", "1"]);
    assert_eq!(added.radius_meters, 75.0);

    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "tracking.nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_track_replay_triggers_once() {
    let home = tempfile::tempdir().unwrap();
    let near = add_reminder(home.path(), &["Near", "--lat", "0", "--lng", "0", "--radius", "100"]);
    let far = add_reminder(home.path(), &["Far", "--lat", "0", "--lng", "0.0018", "--radius", "100"]);

    let track = home.path().join("walk.json");
    std::fs::write(
        &track,
        r#"[{"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 0.0}, {"error": "unavailable"}]"#,
    )
    .unwrap();

    let (code, stdout, stderr) = run_cli(
        home.path(),
        &["track", "--replay", track.to_str().unwrap(), "--no-alerts", "--timeout-ms", "0"],
    );
    assert_eq!(code, 0, "track failed: {stderr}");

    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("event JSON line"))
        .collect();
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types.first(), Some(&"TrackingStarted"));
    assert_eq!(types.iter().filter(|t| **t == "ReminderTriggered").count(), 1);
    assert_eq!(types.iter().filter(|t| **t == "PositionUpdated").count(), 2);
    assert!(types.contains(&"PositionFailed"));
    assert_eq!(types[types.len() - 2], "TrackingStopped");
    assert_eq!(types.last(), Some(&"StateSnapshot"));

    let triggered = events
        .iter()
        .find(|e| e["type"] == "ReminderTriggered")
        .unwrap();
    assert_eq!(triggered["reminder"]["id"], near.id.as_str());

    let stored = list(home.path(), &[]);
    let near_after = stored.iter().find(|r| r.id == near.id).unwrap();
    let far_after = stored.iter().find(|r| r.id == far.id).unwrap();
    assert_eq!(near_after.status, "triggered");
    assert!(near_after.triggered_at.is_some());
    assert_eq!(far_after.status, "active");
}

#[test]
fn test_track_stdin() {
    let home = tempfile::tempdir().unwrap();
    add_reminder(home.path(), &["Corner", "--lat", "10", "--lng", "10", "--radius", "50"]);

    let (code, stdout, stderr) = run_cli_with_stdin(
        home.path(),
        &["track", "--stdin", "--no-alerts", "--timeout-ms", "0"],
        Some("# walk\n9.99,10\nnot a fix\n10,10,3\n"),
    );
    assert_eq!(code, 0, "track failed: {stderr}");
    assert_eq!(stdout.matches("\"ReminderTriggered\"").count(), 1);
    assert_eq!(stdout.matches("\"PositionFailed\"").count(), 1);
    assert!(stdout.lines().last().unwrap().contains("StateSnapshot"));
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("georeminder-cli"));
}
