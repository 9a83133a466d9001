//! What a tick tells the operator, and the per-tick report.

use std::time::Duration;

use dispenser_traits::CivilTime;

use crate::state::{AlarmTime, SystemState};

/// Presence (light-dependent resistor) reading shown while dispensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Taken,
    NotTaken,
    /// Presence monitoring is off.
    Disabled,
}

/// Operator-facing message produced by a tick; rendering lives in `dispenser_ui`.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ClockSynced { time: CivilTime, zone_offset_s: i32 },
    Time(CivilTime),
    TimeUnavailable,
    PromptAlarm,
    AlarmSeed(AlarmTime),
    SeedUnavailable,
    PromptHours,
    PromptMinutes,
    /// Value after an edit.
    AlarmValue(AlarmTime),
    ArmingAlarm(AlarmTime),
    AlarmArmed,
    AlarmFired,
    BuzzerOn,
    BuzzerOff,
    /// One monitoring row; `distance_cm` is `None` for a failed or
    /// out-of-range reading.
    Monitor {
        distance_cm: Option<f32>,
        arm_angle: u8,
        presence: Presence,
    },
    ClockRecovered(CivilTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockHealth {
    Ok,
    /// First read failed, the read after reinitialisation worked.
    Recovered,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Every state the automaton was in during the tick, in order.
    pub path: Vec<SystemState>,
    /// State whose action ran; selects the dwell.
    pub acted_in: SystemState,
    pub notices: Vec<Notice>,
    pub clock: ClockHealth,
    /// Pause before the next tick.
    pub dwell: Duration,
}

impl TickReport {
    pub fn state(&self) -> SystemState {
        self.path.last().copied().unwrap_or(self.acted_in)
    }

    pub fn visited(&self, s: SystemState) -> bool {
        self.path.contains(&s)
    }
}
