#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the dispenser controller.
//!
//! - `Config` and its sections are deserialized from TOML; every section is
//!   optional and falls back to the stock wiring and thresholds.
//! - `Config::validate` rejects values the controller cannot run with.
use std::path::Path;

use serde::Deserialize;

/// BCM pin numbers and the joystick ADC channel.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Pins {
    pub button: u8,
    pub joystick_channel: u8,
    pub buzzer: u8,
    pub trigger: u8,
    pub echo: u8,
    pub servo: u8,
    pub presence: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            button: 5,
            joystick_channel: 0,
            buzzer: 21,
            trigger: 18,
            echo: 17,
            servo: 16,
            presence: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct InputCfg {
    /// Samples at or above this increment the field being edited
    pub up_threshold: u16,
    /// Samples at or below this decrement it
    pub down_threshold: u16,
    /// Rest band of the stick; documentation only, anything between the
    /// thresholds is ignored
    pub center_low: u16,
    pub center_high: u16,
    pub debounce_ms: u64,
    /// Upper bound on the wait for the button to be released
    pub release_timeout_ms: u64,
    /// Button pulls the line low when pressed
    pub active_low: bool,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            up_threshold: 4090,
            down_threshold: 25,
            center_low: 1980,
            center_high: 1983,
            debounce_ms: 50,
            release_timeout_ms: 10_000,
            active_low: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct DistanceCfg {
    /// Bound on each echo edge wait (us)
    pub timeout_us: u64,
    pub trigger_pulse_us: u64,
    /// Speed of sound in cm/s
    pub speed_cm_s: f32,
    pub max_range_cm: f32,
    /// 0 busy-polls the echo line
    pub poll_interval_us: u64,
}

impl Default for DistanceCfg {
    fn default() -> Self {
        Self {
            timeout_us: 1_000_000,
            trigger_pulse_us: 10,
            speed_cm_s: 34_300.0,
            max_range_cm: 400.0,
            poll_interval_us: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ActuatorCfg {
    pub threshold_cm: f32,
    pub dispense_angle: u8,
    pub idle_angle: u8,
    pub servo_min_us: u32,
    pub servo_max_us: u32,
    pub servo_hz: f64,
    pub buzzer_hz: f64,
    /// Fraction of the buzzer period spent high while sounding
    pub buzzer_duty: f64,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            threshold_cm: 40.0,
            dispense_angle: 100,
            idle_angle: 0,
            servo_min_us: 550,
            servo_max_us: 2500,
            servo_hz: 50.0,
            buzzer_hz: 100.0,
            buzzer_duty: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimeSyncCfg {
    pub server: String,
    pub port: u16,
    /// Fixed offset from UTC applied to server time
    pub zone_offset_s: i32,
    /// After this long without an answer a warning is logged; the request
    /// is never resent
    pub response_timeout_ms: u64,
}

impl Default for TimeSyncCfg {
    fn default() -> Self {
        Self {
            server: "time.google.com".to_string(),
            port: 123,
            zone_offset_s: -10_800,
            response_timeout_ms: 5_000,
        }
    }
}

/// Pause after each tick, by state group (ms).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimingCfg {
    pub idle_ms: u64,
    pub prompt_ms: u64,
    pub armed_ms: u64,
    pub monitor_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            idle_ms: 100,
            prompt_ms: 100,
            armed_ms: 1_000,
            monitor_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Hardware {
    /// How often the software RTC checks its alarm
    pub alarm_poll_ms: u64,
    pub adc_spi_hz: u32,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            alarm_poll_ms: 100,
            adc_spi_hz: 1_000_000,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pins: Pins,
    pub input: InputCfg,
    pub distance: DistanceCfg,
    pub actuator: ActuatorCfg,
    pub time_sync: TimeSyncCfg,
    pub timing: TimingCfg,
    pub logging: Logging,
    pub hardware: Hardware,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

const BCM_MAX_PIN: u8 = 27;

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let p = &self.pins;
        let lines = [
            ("button", p.button),
            ("buzzer", p.buzzer),
            ("trigger", p.trigger),
            ("echo", p.echo),
            ("servo", p.servo),
            ("presence", p.presence),
        ];
        for (name, pin) in lines {
            if pin > BCM_MAX_PIN {
                eyre::bail!("pins.{name} must be <= {BCM_MAX_PIN}");
            }
        }
        for (i, (a, pa)) in lines.iter().enumerate() {
            if let Some((b, _)) = lines[i + 1..].iter().find(|(_, pb)| pb == pa) {
                eyre::bail!("pins.{a} and pins.{b} must use different pins");
            }
        }
        if p.joystick_channel > 7 {
            eyre::bail!("pins.joystick_channel must be in 0..=7");
        }

        // Input
        let i = &self.input;
        if i.up_threshold > 4095 {
            eyre::bail!("input.up_threshold must be <= 4095");
        }
        if i.down_threshold >= i.up_threshold {
            eyre::bail!("input.down_threshold must be < input.up_threshold");
        }
        if i.center_low > i.center_high {
            eyre::bail!("input.center_low must be <= input.center_high");
        }
        if i.center_low <= i.down_threshold || i.center_high >= i.up_threshold {
            eyre::bail!("input.center_low..center_high must lie strictly between the thresholds");
        }
        if i.debounce_ms > 1_000 {
            eyre::bail!("input.debounce_ms is unreasonably large (>1s)");
        }
        if i.release_timeout_ms == 0 {
            eyre::bail!("input.release_timeout_ms must be >= 1");
        }

        // Distance
        let d = &self.distance;
        if d.timeout_us == 0 {
            eyre::bail!("distance.timeout_us must be >= 1");
        }
        if d.trigger_pulse_us == 0 {
            eyre::bail!("distance.trigger_pulse_us must be >= 1");
        }
        if !(d.speed_cm_s.is_finite() && d.speed_cm_s > 0.0) {
            eyre::bail!("distance.speed_cm_s must be > 0");
        }
        if !(d.max_range_cm.is_finite() && d.max_range_cm > 0.0) {
            eyre::bail!("distance.max_range_cm must be > 0");
        }
        if d.poll_interval_us >= d.timeout_us {
            eyre::bail!("distance.poll_interval_us must be < distance.timeout_us");
        }

        // Actuator
        let a = &self.actuator;
        if !(a.threshold_cm.is_finite() && a.threshold_cm > 0.0) {
            eyre::bail!("actuator.threshold_cm must be > 0");
        }
        if a.threshold_cm > d.max_range_cm {
            eyre::bail!("actuator.threshold_cm must be <= distance.max_range_cm");
        }
        if a.dispense_angle > 180 || a.idle_angle > 180 {
            eyre::bail!("actuator angles must be in 0..=180");
        }
        if a.servo_min_us >= a.servo_max_us {
            eyre::bail!("actuator.servo_min_us must be < actuator.servo_max_us");
        }
        if !(a.servo_hz.is_finite() && a.servo_hz > 0.0) {
            eyre::bail!("actuator.servo_hz must be > 0");
        }
        if f64::from(a.servo_max_us) * a.servo_hz > 1_000_000.0 {
            eyre::bail!("actuator.servo_max_us must fit in one servo period");
        }
        if !(a.buzzer_hz.is_finite() && a.buzzer_hz > 0.0) {
            eyre::bail!("actuator.buzzer_hz must be > 0");
        }
        if !(a.buzzer_duty > 0.0 && a.buzzer_duty <= 1.0) {
            eyre::bail!("actuator.buzzer_duty must be in (0.0, 1.0]");
        }

        // Time sync
        let t = &self.time_sync;
        if t.server.trim().is_empty() {
            eyre::bail!("time_sync.server must not be empty");
        }
        if t.port == 0 {
            eyre::bail!("time_sync.port must be > 0");
        }
        if t.zone_offset_s.abs() > 14 * 3600 {
            eyre::bail!("time_sync.zone_offset_s must be within +/-14h");
        }
        if t.response_timeout_ms == 0 {
            eyre::bail!("time_sync.response_timeout_ms must be >= 1");
        }

        // Timing
        let tm = &self.timing;
        for (name, ms) in [
            ("idle_ms", tm.idle_ms),
            ("prompt_ms", tm.prompt_ms),
            ("armed_ms", tm.armed_ms),
            ("monitor_ms", tm.monitor_ms),
        ] {
            if ms > 60_000 {
                eyre::bail!("timing.{name} is unreasonably large (>60s)");
            }
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Hardware
        if self.hardware.alarm_poll_ms == 0 {
            eyre::bail!("hardware.alarm_poll_ms must be >= 1");
        }
        if self.hardware.alarm_poll_ms > 1_000 {
            eyre::bail!("hardware.alarm_poll_ms must be <= 1000");
        }
        if self.hardware.adc_spi_hz == 0 {
            eyre::bail!("hardware.adc_spi_hz must be > 0");
        }

        Ok(())
    }
}
