#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Console rendering of operator notices.
//!
//! The automaton only emits `Notice` values; this crate turns them into the
//! text lines shown on the serial console.

use dispenser_core::{Notice, Presence, TickReport};
use dispenser_traits::CivilTime;

/// Shown in place of a distance when the reading is unusable.
pub const DISTANCE_ERROR: &str = "Distance: Error    ";

fn hms(t: &CivilTime) -> String {
    format!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second)
}

/// `UTC-03:00` style zone label.
pub fn zone_label(offset_s: i32) -> String {
    let sign = if offset_s < 0 { '-' } else { '+' };
    let abs = offset_s.unsigned_abs();
    format!("UTC{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

fn presence_label(p: Presence) -> &'static str {
    match p {
        Presence::Taken => "Taken",
        Presence::NotTaken => "Not taken",
        Presence::Disabled => "Disabled",
    }
}

/// One monitoring table row.
pub fn monitor_row(distance_cm: Option<f32>, arm_angle: u8, presence: Presence) -> String {
    let distance = match distance_cm {
        Some(cm) => format!("Distance: {cm:6.2} cm"),
        None => DISTANCE_ERROR.to_string(),
    };
    format!(
        "| {distance} | Arm: {arm_angle:3}° | Presence: {} |",
        presence_label(presence)
    )
}

pub fn render(notice: &Notice) -> String {
    match notice {
        Notice::ClockSynced {
            time,
            zone_offset_s,
        } => format!(
            "Clock set ({}): {:04}-{:02}-{:02} {}",
            zone_label(*zone_offset_s),
            time.year,
            time.month,
            time.day,
            hms(time)
        ),
        Notice::Time(t) => format!("Current time: {}", hms(t)),
        Notice::TimeUnavailable => "Cannot read the current time. Check the RTC.".into(),
        Notice::PromptAlarm => "Set an alarm? Press the button for yes".into(),
        Notice::AlarmSeed(a) => format!("Alarm starts from the current time: {a}"),
        Notice::SeedUnavailable => "Cannot read the time for the alarm. Using 00:00.".into(),
        Notice::PromptHours => "Set the alarm hours".into(),
        Notice::PromptMinutes => "Set the alarm minutes".into(),
        Notice::AlarmValue(a) => a.to_string(),
        Notice::ArmingAlarm(a) => format!("Setting alarm for {a}:00..."),
        Notice::AlarmArmed => "Alarm set".into(),
        Notice::AlarmFired => "Alarm fired!".into(),
        Notice::BuzzerOn => "Buzzer on".into(),
        Notice::BuzzerOff => "Buzzer off".into(),
        Notice::Monitor {
            distance_cm,
            arm_angle,
            presence,
        } => monitor_row(*distance_cm, *arm_angle, *presence),
        Notice::ClockRecovered(t) => format!("RTC restarted, current time: {}", hms(t)),
    }
}

/// Every line a tick produced, in order.
pub fn render_report(report: &TickReport) -> Vec<String> {
    report.notices.iter().map(render).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_labels() {
        assert_eq!(zone_label(-10_800), "UTC-03:00");
        assert_eq!(zone_label(19_800), "UTC+05:30");
        assert_eq!(zone_label(0), "UTC+00:00");
    }
}
