//! Configuration types for the dispenser controller.
//!
//! These are the runtime configuration structs used by the components and the
//! automaton. They are separate from the TOML-deserialized config in
//! `dispenser_config`; see `conversions` for the mapping.

use std::time::Duration;

/// Joystick and button interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputCfg {
    /// Samples `>=` this increment the field.
    pub up_threshold: u16,
    /// Samples `<=` this decrement the field.
    pub down_threshold: u16,
    pub debounce: Duration,
    /// Bound on the blocking wait for button release.
    pub release_timeout: Duration,
    /// Pressed reads low.
    pub active_low: bool,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            up_threshold: 4090,
            down_threshold: 25,
            debounce: Duration::from_millis(50),
            release_timeout: Duration::from_secs(10),
            active_low: true,
        }
    }
}

/// Echo-timing distance measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceCfg {
    /// Bound on each of the two echo edge waits.
    pub timeout: Duration,
    pub trigger_pulse: Duration,
    pub speed_cm_s: f32,
    /// Readings above this are out of range.
    pub max_range_cm: f32,
    /// Zero spins; simulated clocks need a non-zero interval.
    pub poll_interval: Duration,
}

impl Default for DistanceCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_micros(1_000_000),
            trigger_pulse: Duration::from_micros(10),
            speed_cm_s: 34_300.0,
            max_range_cm: 400.0,
            poll_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorCfg {
    pub threshold_cm: f32,
    pub dispense_angle: u8,
    pub idle_angle: u8,
    pub servo_min_us: u32,
    pub servo_max_us: u32,
    pub servo_hz: f64,
    pub buzzer_hz: f64,
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCfg {
    pub server: String,
    pub port: u16,
    pub zone_offset_s: i32,
    /// Silence after which a single warning is logged.
    pub response_timeout: Duration,
}

impl Default for SyncCfg {
    fn default() -> Self {
        Self {
            server: "time.google.com".to_string(),
            port: 123,
            zone_offset_s: -10_800,
            response_timeout: Duration::from_secs(5),
        }
    }
}

/// Pause after a tick, chosen by the state the tick ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingCfg {
    /// `Initial`
    pub idle: Duration,
    /// `AskAlarm`, `SetAlarmHours`, `SetAlarmMinutes`
    pub prompt: Duration,
    /// `AlarmSet`
    pub armed: Duration,
    /// `Monitoring`
    pub monitor: Duration,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(100),
            prompt: Duration::from_millis(100),
            armed: Duration::from_millis(1_000),
            monitor: Duration::from_millis(100),
        }
    }
}
