use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[distance]
timeout_us = 20000

[timing]
idle_ms = 10
prompt_ms = 10
armed_ms = 10
monitor_ms = 10
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect()
}

/// Every stdout line of a JSON run is an object; notices carry tick and state.
#[rstest]
fn run_lines_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = Command::cargo_bin("dispenser")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["run", "--max-ticks", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);
    let (summary, notices) = lines.split_last().expect("at least a summary line");

    assert!(!notices.is_empty());
    for n in notices {
        assert!(n["tick"].as_u64().is_some(), "{n}");
        assert!(n["state"].is_string(), "{n}");
        assert!(n["line"].is_string(), "{n}");
    }
    assert_eq!(notices[0]["tick"], 1);
    assert!(
        notices[0]["line"]
            .as_str()
            .unwrap()
            .starts_with("Clock set (UTC-03:00)")
    );
    assert_eq!(summary["ticks"], 2);
    assert_eq!(summary["state"], "ask_alarm");
}

#[rstest]
fn measure_success_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = Command::cargo_bin("dispenser")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("measure")
        .env("DISPENSER_SIM_DISTANCE_CM", "35")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);
    assert_eq!(lines.len(), 1);
    assert!(lines[0]["distance_cm"].as_f64().is_some());
    assert!(lines[0]["in_range"].is_boolean());
}

#[rstest]
fn measure_timeout_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = Command::cargo_bin("dispenser")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("measure")
        .env("DISPENSER_SIM_NO_ECHO", "1")
        .assert()
        .code(3)
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);
    let err = lines.last().expect("error line");
    assert_eq!(err["reason"], "SensorTimeout");
    assert_eq!(err["exit_code"], 3);
    assert_eq!(err["details"]["phase"], "rise");
    assert!(
        err["message"]
            .as_str()
            .unwrap()
            .starts_with("What happened:")
    );
}

#[rstest]
fn health_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = Command::cargo_bin("dispenser")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("health")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);
    assert_eq!(lines[0]["status"], "ok");
    assert_eq!(lines[0]["time_server"], "time.google.com");
}
