//! `From` implementations bridging `dispenser_config` types to `dispenser_core` types.

use std::time::Duration;

use crate::config::{ActuatorCfg, DistanceCfg, InputCfg, SyncCfg, TimingCfg};

// ── InputCfg ─────────────────────────────────────────────────────────────────

impl From<&dispenser_config::InputCfg> for InputCfg {
    fn from(c: &dispenser_config::InputCfg) -> Self {
        Self {
            up_threshold: c.up_threshold,
            down_threshold: c.down_threshold,
            debounce: Duration::from_millis(c.debounce_ms),
            release_timeout: Duration::from_millis(c.release_timeout_ms),
            active_low: c.active_low,
        }
    }
}

// ── DistanceCfg ──────────────────────────────────────────────────────────────

impl From<&dispenser_config::DistanceCfg> for DistanceCfg {
    fn from(c: &dispenser_config::DistanceCfg) -> Self {
        Self {
            timeout: Duration::from_micros(c.timeout_us),
            trigger_pulse: Duration::from_micros(c.trigger_pulse_us),
            speed_cm_s: c.speed_cm_s,
            max_range_cm: c.max_range_cm,
            poll_interval: Duration::from_micros(c.poll_interval_us),
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&dispenser_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &dispenser_config::ActuatorCfg) -> Self {
        Self {
            threshold_cm: c.threshold_cm,
            dispense_angle: c.dispense_angle,
            idle_angle: c.idle_angle,
            servo_min_us: c.servo_min_us,
            servo_max_us: c.servo_max_us,
            servo_hz: c.servo_hz,
            buzzer_hz: c.buzzer_hz,
            buzzer_duty: c.buzzer_duty,
        }
    }
}

// ── SyncCfg ──────────────────────────────────────────────────────────────────

impl From<&dispenser_config::TimeSyncCfg> for SyncCfg {
    fn from(c: &dispenser_config::TimeSyncCfg) -> Self {
        Self {
            server: c.server.clone(),
            port: c.port,
            zone_offset_s: c.zone_offset_s,
            response_timeout: Duration::from_millis(c.response_timeout_ms),
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&dispenser_config::TimingCfg> for TimingCfg {
    fn from(c: &dispenser_config::TimingCfg) -> Self {
        Self {
            idle: Duration::from_millis(c.idle_ms),
            prompt: Duration::from_millis(c.prompt_ms),
            armed: Duration::from_millis(c.armed_ms),
            monitor: Duration::from_millis(c.monitor_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_file_defaults_match_runtime_defaults() {
        let file = dispenser_config::Config::default();
        assert_eq!(InputCfg::from(&file.input), InputCfg::default());
        assert_eq!(DistanceCfg::from(&file.distance), DistanceCfg::default());
        assert_eq!(ActuatorCfg::from(&file.actuator), ActuatorCfg::default());
        assert_eq!(SyncCfg::from(&file.time_sync), SyncCfg::default());
        assert_eq!(TimingCfg::from(&file.timing), TimingCfg::default());
    }
}
