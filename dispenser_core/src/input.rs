//! Manual input: joystick axis interpretation and the confirm button.

use std::sync::Arc;
use std::time::Duration;

use dispenser_traits::{Clock, DigitalInput};

use crate::config::InputCfg;
use crate::util::wait_for_level;

/// A time-of-day field that wraps at both ends (`0..=max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedField {
    value: u8,
    max: u8,
}

impl BoundedField {
    /// Values above `max` are clamped.
    pub const fn new(value: u8, max: u8) -> Self {
        let value = if value > max { max } else { value };
        Self { value, max }
    }

    pub const fn value(&self) -> u8 {
        self.value
    }

    pub const fn max(&self) -> u8 {
        self.max
    }

    pub fn increment(&mut self) {
        self.value = if self.value >= self.max { 0 } else { self.value + 1 };
    }

    pub fn decrement(&mut self) {
        self.value = if self.value == 0 { self.max } else { self.value - 1 };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Increment,
    Decrement,
}

/// Joystick deflection thresholds on a 12-bit axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisThresholds {
    pub up: u16,
    pub down: u16,
}

impl Default for AxisThresholds {
    fn default() -> Self {
        Self { up: 4090, down: 25 }
    }
}

impl From<&InputCfg> for AxisThresholds {
    fn from(c: &InputCfg) -> Self {
        Self {
            up: c.up_threshold,
            down: c.down_threshold,
        }
    }
}

impl AxisThresholds {
    pub fn classify(&self, sample: u16) -> Option<ChangeEvent> {
        if sample >= self.up {
            Some(ChangeEvent::Increment)
        } else if sample <= self.down {
            Some(ChangeEvent::Decrement)
        } else {
            None
        }
    }

    /// Apply one sample to `field`, returning the edit made, if any.
    pub fn interpret(&self, sample: u16, field: &mut BoundedField) -> Option<ChangeEvent> {
        let ev = self.classify(sample)?;
        match ev {
            ChangeEvent::Increment => field.increment(),
            ChangeEvent::Decrement => field.decrement(),
        }
        tracing::trace!(sample, value = field.value(), ?ev, "axis edit");
        Some(ev)
    }
}

/// `interpret` with the stock thresholds (4090 up, 25 down).
pub fn interpret_axis(sample: u16, field: &mut BoundedField) -> Option<ChangeEvent> {
    AxisThresholds::default().interpret(sample, field)
}

const RELEASE_POLL: Duration = Duration::from_millis(1);

/// Confirm button. One physical press yields one confirm: after the debounce
/// delay the call blocks until release, bounded by the release timeout.
///
/// A press still held when the timeout expires is latched; no further
/// confirm is reported until the button has been seen released.
pub struct Button {
    pin: Box<dyn DigitalInput>,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: InputCfg,
    held: bool,
}

impl Button {
    pub fn new(pin: Box<dyn DigitalInput>, clock: Arc<dyn Clock + Send + Sync>, cfg: InputCfg) -> Self {
        Self {
            pin,
            clock,
            cfg,
            held: false,
        }
    }

    /// Still waiting for the release of an accepted press.
    pub fn held(&self) -> bool {
        self.held
    }

    pub fn is_pressed(&self) -> bool {
        self.pin.is_high() != self.cfg.active_low
    }

    /// True when a press was seen on this call.
    pub fn take_press(&mut self) -> bool {
        if !self.is_pressed() {
            if self.held {
                tracing::debug!("held button released");
                self.held = false;
            }
            return false;
        }
        if self.held {
            return false;
        }
        self.clock.sleep(self.cfg.debounce);
        let pin = &self.pin;
        let active_low = self.cfg.active_low;
        let released = wait_for_level(
            || pin.is_high() != active_low,
            false,
            self.cfg.release_timeout,
            RELEASE_POLL,
            &*self.clock,
        );
        if released.is_none() {
            self.held = true;
            tracing::warn!(
                timeout_ms = self.cfg.release_timeout.as_millis() as u64,
                "button still held after release timeout; accepting press once"
            );
        }
        tracing::debug!("button confirm");
        true
    }
}
