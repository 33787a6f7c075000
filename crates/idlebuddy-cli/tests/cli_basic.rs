//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (code, stdout, stderr).
fn run_cli(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_idlebuddy"))
        .args(args)
        .env("IDLEBUDDY_DATA_DIR", dir)
        .env_remove("IDLEBUDDY_ENV")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_status_on_fresh_install() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_json(dir.path(), &["status"]);
    assert_eq!(status["economy"]["coins"], 0.0);
    assert_eq!(status["focus"]["state"], "idle");
    assert_eq!(status["buddy"]["level"], 1);
    assert_eq!(status["battle"]["phase"], "not_started");
    assert!(dir.path().join("config.toml").exists());
    assert!(dir.path().join("idlebuddy.db").exists());
}

#[test]
fn test_click_then_buy() {
    let dir = tempfile::tempdir().unwrap();
    let clicked = run_json(dir.path(), &["click", "--times", "10"]);
    assert_eq!(clicked["outcome"].as_array().unwrap().len(), 10);

    let bought = run_json(dir.path(), &["buy", "basicMiner"]);
    assert_eq!(bought["outcome"]["outcome"], "purchased");
    assert_eq!(bought["outcome"]["upgrade_id"], "basicMiner");

    let status = run_json(dir.path(), &["status"]);
    assert_eq!(status["economy"]["upgrades"]["basicMiner"]["count"], 1);
    assert!(status["economy"]["total_clicks"].as_u64().unwrap() >= 10);
}

#[test]
fn test_refused_purchase_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["buy", "aiAssistant"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (code, _, _) = run_cli(dir.path(), &["buy", "warpDrive"]);
    assert_eq!(code, 1);
}

#[test]
fn test_deadline_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let added = run_json(dir.path(), &["ddl", "add", "Ship release", "--in-hours", "30"]);
    let id = added["outcome"]["id"].as_str().unwrap().to_string();

    let pending = run_json(dir.path(), &["ddl", "list"]);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["name"], "Ship release");

    run_json(dir.path(), &["ddl", "done", &id]);
    let pending = run_json(dir.path(), &["ddl", "list"]);
    assert!(pending.as_array().unwrap().is_empty());
    let all = run_json(dir.path(), &["ddl", "list", "--all"]);
    assert_eq!(all[0]["completed"], true);

    let (code, _, _) = run_cli(dir.path(), &["ddl", "delete", "no-such-id"]);
    assert_eq!(code, 1);
}

#[test]
fn test_focus_transitions() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["focus", "start", "--minutes", "5"]);
    run_json(dir.path(), &["focus", "pause"]);

    let focus = run_json(dir.path(), &["focus", "status"]);
    assert_eq!(focus["state"], "paused");

    let (code, _, _) = run_cli(dir.path(), &["focus", "pause"]);
    assert_eq!(code, 1);

    run_json(dir.path(), &["focus", "resume"]);
    run_json(dir.path(), &["focus", "stop"]);
    let focus = run_json(dir.path(), &["focus", "status"]);
    assert_eq!(focus["state"], "idle");
}

#[test]
fn test_advance_completes_a_session() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["focus", "start", "--minutes", "1"]);

    let advanced = run_json(dir.path(), &["advance", "60"]);
    let completed = advanced["events"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["type"] == "FocusCompleted");
    assert!(completed);
    assert_eq!(advanced["snapshot"]["focus"]["state"], "idle");

    let stats = run_json(dir.path(), &["focus", "stats"]);
    assert_eq!(stats["completed_work_sessions"], 1);
    let history = run_json(dir.path(), &["focus", "history"]);
    assert_eq!(history[0]["session_type"], "work");
}

#[test]
fn test_buddy_interaction() {
    let dir = tempfile::tempdir().unwrap();
    let fed = run_json(dir.path(), &["buddy", "feed"]);
    assert!(fed["events"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["type"] == "BuddyInteracted"));

    let (code, _, _) = run_cli(dir.path(), &["buddy", "skin", "ninja"]);
    assert_eq!(code, 1);
}

#[test]
fn test_battle_start_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let started = run_json(dir.path(), &["battle", "start"]);
    assert_eq!(started["outcome"]["wave"], 1);

    let battle = run_json(dir.path(), &["battle", "status"]);
    assert_eq!(battle["phase"], "in_battle");

    run_json(dir.path(), &["battle", "stop"]);
    let (code, _, _) = run_cli(dir.path(), &["battle", "next"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "set", "focus.work_minutes", "30"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "focus.work_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");

    let (code, _, _) = run_cli(dir.path(), &["config", "get", "focus.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_run_exits_after_duration() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["run", "--for", "0"]);
    assert_eq!(code, 0, "{stderr}");
}

#[test]
fn test_unrepresentable_deadline_offsets_fail() {
    let dir = tempfile::tempdir().unwrap();
    for hours in ["1e20", "-1e20", "NaN", "inf", "-inf"] {
        let arg = format!("--in-hours={hours}");
        let (code, _, stderr) = run_cli(dir.path(), &["ddl", "add", "Far away", &arg]);
        assert_eq!(code, 1, "{hours}: {stderr}");
        assert!(stderr.contains("out of range"), "{hours}: {stderr}");
    }
    let pending = run_json(dir.path(), &["ddl", "list"]);
    assert!(pending.as_array().unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn test_run_saves_on_interrupt() {
    use std::process::Stdio;
    use std::thread;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    // Only the shutdown save may persist the rounds fought.
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "storage.autosave_secs", "0"]);
    assert_eq!(code, 0);
    run_json(dir.path(), &["battle", "start"]);

    let mut child = Command::new(env!("CARGO_BIN_EXE_idlebuddy"))
        .args(["run", "--tick-ms", "100"])
        .env("IDLEBUDDY_DATA_DIR", dir.path())
        .env_remove("IDLEBUDDY_ENV")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn run");
    thread::sleep(Duration::from_millis(2500));

    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("Failed to send SIGINT");
    assert!(status.success());
    let output = child.wait_with_output().unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let battle = run_json(dir.path(), &["battle", "status"]);
    assert!(battle["round"].as_u64().unwrap() >= 1, "{battle}");
}
