//! Real-time clock capability: calendar time plus one-shot alarms.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::BoxError;

/// Calendar timestamp as stored by the real-time clock.
/// `weekday` counts from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CivilTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilTime {
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, u32::from(self.month), u32::from(self.day))?
            .and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
    }
}

impl From<NaiveDateTime> for CivilTime {
    fn from(dt: NaiveDateTime) -> Self {
        // chrono guarantees every component below fits in a u8
        Self {
            year: dt.year(),
            month: dt.month() as u8,
            day: dt.day() as u8,
            weekday: dt.weekday().num_days_from_sunday() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }
}

impl core::fmt::Display for CivilTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Alarm pattern; `None` fields are wildcards that match any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmMatch {
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub weekday: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
}

impl AlarmMatch {
    /// Fire at `hour:minute:second` on any day.
    pub fn daily(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour: Some(hour),
            minute: Some(minute),
            second: Some(second),
            ..Self::default()
        }
    }

    pub fn matches(&self, t: &CivilTime) -> bool {
        fn field<T: PartialEq>(want: Option<T>, got: T) -> bool {
            want.is_none_or(|w| w == got)
        }
        field(self.year, t.year)
            && field(self.month, t.month)
            && field(self.day, t.day)
            && field(self.weekday, t.weekday)
            && field(self.hour, t.hour)
            && field(self.minute, t.minute)
            && field(self.second, t.second)
    }
}

pub type AlarmCallback = Box<dyn FnMut() + Send>;

/// Real-time clock with a single one-shot alarm slot.
///
/// Implementations must disarm the alarm before invoking its callback so a
/// callback runs at most once per `set_alarm`.
pub trait RealTimeClock {
    fn datetime(&mut self) -> Result<CivilTime, BoxError>;
    fn set_datetime(&mut self, t: CivilTime) -> Result<(), BoxError>;
    /// Restart the clock peripheral after a failed read.
    fn reinit(&mut self) -> Result<(), BoxError>;
    /// Replace any armed alarm with `at`.
    fn set_alarm(&mut self, at: AlarmMatch, on_fire: AlarmCallback) -> Result<(), BoxError>;
    fn disable_alarm(&mut self) -> Result<(), BoxError>;
}
