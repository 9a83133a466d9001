use std::time::Duration;

use dispenser_core::{AlarmTime, ClockHealth, Notice, Presence, SystemState, TickReport};
use dispenser_traits::CivilTime;
use dispenser_ui::{monitor_row, render, render_report};
use rstest::rstest;

fn t(hour: u8, minute: u8, second: u8) -> CivilTime {
    CivilTime {
        year: 2025,
        month: 2,
        day: 21,
        weekday: 5,
        hour,
        minute,
        second,
    }
}

#[rstest]
#[case(Some(35.071), 100, Presence::NotTaken, "| Distance:  35.07 cm | Arm: 100° | Presence: Not taken |")]
#[case(Some(4.0), 0, Presence::Disabled, "| Distance:   4.00 cm | Arm:   0° | Presence: Disabled |")]
#[case(None, 100, Presence::Taken, "| Distance: Error     | Arm: 100° | Presence: Taken |")]
fn monitoring_rows(
    #[case] cm: Option<f32>,
    #[case] angle: u8,
    #[case] presence: Presence,
    #[case] expected: &str,
) {
    assert_eq!(monitor_row(cm, angle, presence), expected);
}

#[test]
fn error_row_lines_up_with_value_row() {
    let ok = monitor_row(Some(123.45), 0, Presence::Disabled);
    let err = monitor_row(None, 0, Presence::Disabled);
    assert_eq!(ok.chars().count(), err.chars().count());
}

#[rstest]
#[case(Notice::Time(t(14, 30, 0)), "Current time: 14:30:00")]
#[case(Notice::AlarmValue(AlarmTime::new(0, 30)), "00:30")]
#[case(Notice::ArmingAlarm(AlarmTime::new(14, 31)), "Setting alarm for 14:31:00...")]
#[case(Notice::SeedUnavailable, "Cannot read the time for the alarm. Using 00:00.")]
#[case(Notice::ClockRecovered(t(9, 5, 7)), "RTC restarted, current time: 09:05:07")]
#[case(
    Notice::ClockSynced { time: t(14, 30, 0), zone_offset_s: -10_800 },
    "Clock set (UTC-03:00): 2025-02-21 14:30:00"
)]
fn notices(#[case] n: Notice, #[case] expected: &str) {
    assert_eq!(render(&n), expected);
}

#[test]
fn report_lines_keep_order() {
    let report = TickReport {
        path: vec![SystemState::ShowTime, SystemState::AskAlarm],
        acted_in: SystemState::ShowTime,
        notices: vec![Notice::Time(t(14, 30, 0)), Notice::PromptAlarm],
        clock: ClockHealth::Ok,
        dwell: Duration::ZERO,
    };
    assert_eq!(
        render_report(&report),
        vec![
            "Current time: 14:30:00".to_string(),
            "Set an alarm? Press the button for yes".to_string(),
        ]
    );
}
