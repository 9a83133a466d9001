//! Bounded waits and unit conversions shared by the components.

use std::time::Duration;

use dispenser_traits::Clock;

/// Wait until `read()` reports `level`, or `timeout` expires.
///
/// Returns the time spent waiting, `None` on expiry. With a zero
/// `poll_interval` the loop spins on the CPU, which echo timing on real pins
/// needs; simulated clocks must use a non-zero interval so time advances.
pub fn wait_for_level(
    mut read: impl FnMut() -> bool,
    level: bool,
    timeout: Duration,
    poll_interval: Duration,
    clock: &dyn Clock,
) -> Option<Duration> {
    let start = clock.now();
    let deadline = start + timeout;
    loop {
        if read() == level {
            return Some(clock.now().saturating_duration_since(start));
        }
        if clock.now() >= deadline {
            return None;
        }
        if poll_interval.is_zero() {
            std::hint::spin_loop();
        } else {
            clock.sleep(poll_interval);
        }
    }
}

/// Round-trip echo pulse width to one-way distance in centimetres.
#[inline]
pub fn pulse_to_cm(pulse: Duration, speed_cm_s: f32) -> f32 {
    (pulse.as_secs_f64() * f64::from(speed_cm_s) / 2.0) as f32
}

/// Servo pulse width for `angle` degrees, linear between the two end stops.
#[inline]
pub fn servo_pulse_us(angle: u8, min_us: u32, max_us: u32) -> u32 {
    let angle = u32::from(angle.min(180));
    min_us + angle * (max_us - min_us) / 180
}
