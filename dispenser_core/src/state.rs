//! Automaton states, the transition table, and the data the automaton owns.

use dispenser_traits::CivilTime;

use crate::input::BoundedField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    Initial,
    ShowTime,
    AskAlarm,
    SetAlarmHours,
    SetAlarmMinutes,
    AlarmSet,
    AlarmTriggered,
    Monitoring,
}

impl SystemState {
    pub const ALL: [Self; 8] = [
        Self::Initial,
        Self::ShowTime,
        Self::AskAlarm,
        Self::SetAlarmHours,
        Self::SetAlarmMinutes,
        Self::AlarmSet,
        Self::AlarmTriggered,
        Self::Monitoring,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::ShowTime => "show_time",
            Self::AskAlarm => "ask_alarm",
            Self::SetAlarmHours => "set_alarm_hours",
            Self::SetAlarmMinutes => "set_alarm_minutes",
            Self::AlarmSet => "alarm_set",
            Self::AlarmTriggered => "alarm_triggered",
            Self::Monitoring => "monitoring",
        }
    }
}

impl core::fmt::Display for SystemState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tick observed, as far as the transition table cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// Nothing of note.
    Idle,
    /// The sync response was committed to the RTC.
    Synced,
    /// Button press.
    Confirm,
    AlarmFired,
    /// The arm went back to idle after a dispense.
    CycleComplete,
}

impl Input {
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::Synced,
        Self::Confirm,
        Self::AlarmFired,
        Self::CycleComplete,
    ];
}

/// The transition table. Total: every pair yields a state, and pairs the
/// table does not name keep the current state.
pub const fn transition(state: SystemState, input: Input) -> SystemState {
    use Input::*;
    use SystemState::*;
    match (state, input) {
        (Initial, Synced) => ShowTime,
        (ShowTime, _) => AskAlarm,
        (AskAlarm, Confirm) => SetAlarmHours,
        (SetAlarmHours, Confirm) => SetAlarmMinutes,
        (SetAlarmMinutes, Confirm) => AlarmSet,
        (AlarmSet, AlarmFired) => AlarmTriggered,
        (AlarmTriggered, _) => Monitoring,
        (Monitoring, CycleComplete) => AlarmSet,
        (s, _) => s,
    }
}

/// Daily alarm being edited or armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTime {
    pub hours: BoundedField,
    pub minutes: BoundedField,
}

impl Default for AlarmTime {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl AlarmTime {
    pub const fn new(hours: u8, minutes: u8) -> Self {
        Self {
            hours: BoundedField::new(hours, 23),
            minutes: BoundedField::new(minutes, 59),
        }
    }

    pub fn seeded_from(t: &CivilTime) -> Self {
        Self::new(t.hour, t.minute)
    }
}

impl core::fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}:{:02}", self.hours.value(), self.minutes.value())
    }
}

/// Dispensing flags. `servo_extended` and `buzzer_on` are never both set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorState {
    pub servo_extended: bool,
    pub presence_monitoring: bool,
    pub buzzer_on: bool,
}

impl ActuatorState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
