use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Simulation backend: pins are unused but the file is parsed and validated.
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[distance]
timeout_us = 20000

[time_sync]
server = "time.example.org"
response_timeout_ms = 100

[timing]
idle_ms = 10
prompt_ms = 10
armed_ms = 10
monitor_ms = 10
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn dispenser(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("dispenser").unwrap();
    cmd.arg("--log-level").arg("warn").arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["health"], 0, "config ok", "stdout")]
#[case(&["sync"], 0, "Clock set (UTC-03:00)", "stdout")]
#[case(&["self-check"], 0, "self-check: ok", "stdout")]
#[case(&["self-check"], 0, "joystick: 1981 (center)", "stdout")]
#[case(&["run", "--max-ticks", "3"], 0, "Set an alarm? Press the button for yes", "stdout")]
#[case(&["run", "--max-ticks", "3"], 0, "Stopped after 3 ticks in state ask_alarm", "stdout")]
#[case(&["measure", "--bogus"], 2, "unexpected argument", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let mut cmd = dispenser(&cfg);
    cmd.args(args);
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn help_lists_subcommands() {
    Command::cargo_bin("dispenser")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Usage:")
                .and(predicate::str::contains("measure"))
                .and(predicate::str::contains("self-check")),
        );
}

#[rstest]
fn measure_reports_simulated_distance() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    dispenser(&cfg)
        .env("DISPENSER_SIM_DISTANCE_CM", "35")
        .arg("measure")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Distance: \d+\.\d\d cm").unwrap());
}

#[rstest]
fn measure_without_echo_exits_with_sensor_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    dispenser(&cfg)
        .env("DISPENSER_SIM_NO_ECHO", "1")
        .arg("measure")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "What happened: The distance sensor never answered",
        ));
}

#[rstest]
fn silent_time_server_exits_with_sync_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    dispenser(&cfg)
        .env("DISPENSER_SIM_NTP_SILENT", "1")
        .arg("sync")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Time synchronisation failed"));
}

#[rstest]
#[case("[pins]\nbuzzer = 18\n", "pins.buzzer and pins.trigger must use different pins")]
#[case("[actuator]\nbuzzer_duty = 1.5\n", "actuator.buzzer_duty")]
#[case("[unknown]\nx = 1\n", "unknown field")]
fn invalid_config_exits_with_config_code(#[case] extra: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, extra);
    dispenser(&cfg)
        .arg("health")
        .assert()
        .code(5)
        .stderr(
            predicate::str::contains("What happened: The configuration could not be loaded")
                .and(predicate::str::contains(needle)),
        );
}

#[rstest]
fn explicit_missing_config_is_an_error() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("dispenser")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("health")
        .assert()
        .code(5);
}

#[rstest]
fn file_log_receives_json_lines() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("dispenser.jsonl");
    let extra = format!(
        "[logging]\nfile = \"{}\"\nlevel = \"info\"\n",
        log.display().to_string().replace('\\', "/")
    );
    let cfg = write_config(&dir, &extra);
    dispenser(&cfg)
        .args(["run", "--max-ticks", "2"])
        .assert()
        .success();
    let text = fs::read_to_string(&log).unwrap();
    let first = text.lines().next().expect("log has lines");
    let v: serde_json::Value = serde_json::from_str(first).unwrap();
    assert!(v.get("level").is_some(), "{first}");
    assert!(text.contains("state change"), "{text}");
}
