use std::io::Write;

use dispenser_config::{Config, load_file, load_toml};
use rstest::rstest;

#[test]
fn empty_file_yields_stock_wiring() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.pins.button, 5);
    assert_eq!(cfg.pins.servo, 16);
    assert_eq!(cfg.input.up_threshold, 4090);
    assert_eq!(cfg.input.down_threshold, 25);
    assert_eq!(cfg.distance.timeout_us, 1_000_000);
    assert_eq!(cfg.actuator.threshold_cm, 40.0);
    assert_eq!(cfg.actuator.dispense_angle, 100);
    assert_eq!(cfg.time_sync.server, "time.google.com");
    assert_eq!(cfg.time_sync.zone_offset_s, -10_800);
    assert_eq!(cfg.timing.armed_ms, 1_000);
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let toml = r#"
[actuator]
threshold_cm = 25.0

[time_sync]
server = "pool.ntp.org"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.actuator.threshold_cm, 25.0);
    assert_eq!(cfg.actuator.servo_max_us, 2500);
    assert_eq!(cfg.time_sync.server, "pool.ntp.org");
    assert_eq!(cfg.time_sync.port, 123);
}

#[test]
fn unknown_section_is_a_parse_error() {
    let err = load_toml("[motor]\nspeed = 3\n").expect_err("unknown section");
    assert!(err.to_string().contains("motor"));
}

#[rstest]
#[case("[pins]\nservo = 40\n", "pins.servo must be <= 27")]
#[case("[pins]\nbuzzer = 5\n", "pins.button and pins.buzzer must use different pins")]
#[case("[pins]\njoystick_channel = 8\n", "pins.joystick_channel")]
#[case("[input]\ndown_threshold = 4090\n", "input.down_threshold must be <")]
#[case("[input]\ncenter_low = 10\n", "input.center_low..center_high")]
#[case("[input]\nrelease_timeout_ms = 0\n", "input.release_timeout_ms must be >= 1")]
#[case("[distance]\ntimeout_us = 0\n", "distance.timeout_us must be >= 1")]
#[case("[distance]\nspeed_cm_s = 0.0\n", "distance.speed_cm_s must be > 0")]
#[case("[actuator]\nthreshold_cm = 500.0\n", "actuator.threshold_cm must be <=")]
#[case("[actuator]\ndispense_angle = 200\n", "actuator angles must be in 0..=180")]
#[case("[actuator]\nservo_min_us = 2500\n", "actuator.servo_min_us must be <")]
#[case("[actuator]\nbuzzer_duty = 0.0\n", "actuator.buzzer_duty must be in")]
#[case("[time_sync]\nserver = \"  \"\n", "time_sync.server must not be empty")]
#[case("[time_sync]\nzone_offset_s = 90000\n", "time_sync.zone_offset_s")]
#[case("[timing]\narmed_ms = 120000\n", "timing.armed_ms is unreasonably large")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
#[case("[hardware]\nalarm_poll_ms = 0\n", "hardware.alarm_poll_ms must be >= 1")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] message: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(message),
        "expected {message:?} in {err}"
    );
}

#[test]
fn load_file_parses_and_validates() {
    let mut f = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(f, "[distance]\nmax_range_cm = 250.0").expect("write");
    let cfg = load_file(f.path()).expect("load");
    assert_eq!(cfg.distance.max_range_cm, 250.0);

    let mut bad = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(bad, "[distance]\nmax_range_cm = -1.0").expect("write");
    let err = load_file(bad.path()).expect_err("invalid range");
    assert!(format!("{err}").contains("distance.max_range_cm must be > 0"));
}

#[test]
fn default_config_equals_empty_file() {
    assert_eq!(load_toml("").expect("parse"), Config::default());
}
