use std::sync::Arc;
use std::time::Duration;

use dispenser_core::{DispenserError, DistanceCfg, DistanceSensor, EchoPhase};
use dispenser_hardware::sim::{SimPin, SimRanger};
use dispenser_traits::Clock;
use dispenser_traits::clock::test_clock::TestClock;
use rstest::rstest;

fn sensor(distance_cm: Option<f32>) -> (TestClock, SimRanger, DistanceSensor) {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let ranger = SimRanger::new(shared.clone(), distance_cm);
    let cfg = DistanceCfg {
        poll_interval: Duration::from_micros(5),
        ..DistanceCfg::default()
    };
    let s = DistanceSensor::new(
        Box::new(ranger.trigger()),
        Box::new(ranger.echo()),
        shared,
        cfg,
    );
    (clock, ranger, s)
}

#[rstest]
#[case(35.0)]
#[case(4.0)]
#[case(150.0)]
fn measures_simulated_target(#[case] cm: f32) {
    let (_, _, mut s) = sensor(Some(cm));
    let got = s.measure().unwrap();
    assert!((got - cm).abs() < 0.1, "expected {cm}, got {got}");
}

#[test]
fn missing_rise_times_out_after_one_second() {
    let (clock, _, mut s) = sensor(None);
    let start = clock.elapsed();
    let err = s.measure().unwrap_err();
    assert_eq!(
        err,
        DispenserError::SensorTimeout {
            phase: EchoPhase::Rise
        }
    );
    let waited = clock.elapsed() - start;
    assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
    assert!(waited < Duration::from_millis(1_100), "waited {waited:?}");
}

#[test]
fn stuck_echo_times_out_on_fall() {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let cfg = DistanceCfg {
        timeout: Duration::from_millis(2),
        poll_interval: Duration::from_micros(5),
        ..DistanceCfg::default()
    };
    let mut s = DistanceSensor::new(
        Box::new(SimPin::new(false)),
        Box::new(SimPin::new(true)),
        shared,
        cfg,
    );
    assert_eq!(
        s.measure().unwrap_err(),
        DispenserError::SensorTimeout {
            phase: EchoPhase::Fall
        }
    );
}

#[test]
fn sensor_recovers_after_target_appears() {
    let (_, ranger, mut s) = sensor(None);
    assert!(s.measure().is_err());
    ranger.set_distance(Some(60.0));
    let got = s.measure().unwrap();
    assert!((got - 60.0).abs() < 0.1, "got {got}");
}
