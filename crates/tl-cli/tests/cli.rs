//! CLI command integration tests.
//! Each test uses a temp directory via TL_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Nothing listens here; any real request fails fast.
const DEAD_API: &str = "http://127.0.0.1:9";

fn tl_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("tl").unwrap();
    cmd.env("TL_DATA_DIR", data_dir.path());
    cmd.env("TL_API_URL", DEAD_API);
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn log_fresh_dir() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no messages)"));
}

#[test]
fn send_sos_then_log_in_order() {
    let dir = TempDir::new().unwrap();

    tl_cmd(&dir)
        .args(["send", "  water at the door  "])
        .assert()
        .success()
        .stdout(predicate::str::contains("water at the door"));
    tl_cmd(&dir)
        .args(["send", "trapped on the roof"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[URGENT] trapped on the roof"));
    tl_cmd(&dir).arg("sos").assert().success();

    let output = tl_cmd(&dir).arg("log").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("#0"));
    assert!(lines[0].ends_with(" water at the door"));
    assert!(!lines[0].contains("[URGENT]"));
    assert!(lines[1].contains("[URGENT] trapped on the roof"));
    assert!(lines[2].contains("[URGENT] SOS broadcast activated!"));

    tl_cmd(&dir)
        .args(["log", "--urgent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("water").not());
}

#[test]
fn blank_send_rejected_and_not_logged() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .args(["send", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("message is empty"));
    tl_cmd(&dir)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no messages)"));
}

#[test]
fn classify_offline_sos() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .args(["classify", "--offline", "Trapped under rubble, bleeding"])
        .assert()
        .success()
        .stdout(predicate::str::contains("label:   sos"))
        .stdout(predicate::str::contains("score:   1.00"))
        .stdout(predicate::str::contains("trapped, under rubble, bleeding"))
        .stdout(predicate::str::contains("local:   urgent (trapped)"));
}

#[test]
fn classify_offline_json() {
    let dir = TempDir::new().unwrap();
    let output = tl_cmd(&dir)
        .args(["classify", "--offline", "--json", "smoke on floor 2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["label"], "urgent");
    assert_eq!(value["score"], 0.7);
    assert_eq!(value["matched"], serde_json::json!(["smoke"]));
}

#[test]
fn classify_unreachable_service_fails() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .args(["classify", "help"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("classify failed"));
}

#[test]
fn summarize_blank_needs_no_service() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .args(["summarize", "   "])
        .assert()
        .success()
        .stdout(predicate::str::contains("(nothing to summarize)"));
}

#[test]
fn compress_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .arg("compress")
        .arg(dir.path().join("nope.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn radar_runs_fixed_ticks() {
    let dir = TempDir::new().unwrap();
    let output = tl_cmd(&dir)
        .args(["radar", "--ticks", "3", "--seed", "42", "--interval-ms", "20"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines.len() >= 2 && lines.len() <= 4, "{stdout}");
    assert!(lines[0].starts_with("tick 0  Node1: 5.0m  Node2: 12.0m  Node3: 20.0m"));
    assert!(lines.last().unwrap().starts_with("tick 3 "));
}

#[test]
fn mesh_default_chain() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .arg("mesh")
        .assert()
        .success()
        .stdout(predicate::str::contains("A-B"))
        .stdout(predicate::str::contains("C-D"))
        .stdout(predicate::str::contains("converged: true"));
}

#[test]
fn mesh_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[mesh]\nnodes = [\"A\", \"B\"]\nedges = [\"A-Z\"]\n",
    )
    .unwrap();
    tl_cmd(&dir)
        .arg("mesh")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid mesh topology"));
}

#[test]
fn chat_session_from_stdin() {
    let dir = TempDir::new().unwrap();
    tl_cmd(&dir)
        .args(["chat", "--seed", "1"])
        .write_stdin("hello shelter\n   \n/sos\n/peers\n/log\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello shelter"))
        .stdout(predicate::str::contains("[URGENT] SOS broadcast activated!"))
        .stdout(predicate::str::contains("Node1"))
        .stdout(predicate::str::contains("session closed: 2 messages"));

    // Chat lines are journaled like one-shot sends.
    let output = tl_cmd(&dir).arg("log").output().unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 2);
}
