//! Ultrasonic echo-timing distance sensor.

use std::sync::Arc;

use dispenser_traits::{Clock, DigitalInput, DigitalOutput};

use crate::config::DistanceCfg;
use crate::error::{DispenserError, EchoPhase};
use crate::util::{pulse_to_cm, wait_for_level};

pub struct DistanceSensor {
    trigger: Box<dyn DigitalOutput>,
    echo: Box<dyn DigitalInput>,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: DistanceCfg,
}

impl DistanceSensor {
    pub fn new(
        trigger: Box<dyn DigitalOutput>,
        echo: Box<dyn DigitalInput>,
        clock: Arc<dyn Clock + Send + Sync>,
        cfg: DistanceCfg,
    ) -> Self {
        Self {
            trigger,
            echo,
            clock,
            cfg,
        }
    }

    pub fn cfg(&self) -> &DistanceCfg {
        &self.cfg
    }

    /// One measurement: trigger pulse, then the echo rise and fall, each
    /// bounded by the configured timeout. No retries.
    ///
    /// The result is not range-checked; see `actuator::Sample::classify`.
    pub fn measure(&mut self) -> Result<f32, DispenserError> {
        self.trigger.set_high();
        self.clock.sleep(self.cfg.trigger_pulse);
        self.trigger.set_low();

        let echo = &self.echo;
        let clock = &*self.clock;
        wait_for_level(
            || echo.is_high(),
            true,
            self.cfg.timeout,
            self.cfg.poll_interval,
            clock,
        )
        .ok_or(DispenserError::SensorTimeout {
            phase: EchoPhase::Rise,
        })?;
        let width = wait_for_level(
            || echo.is_high(),
            false,
            self.cfg.timeout,
            self.cfg.poll_interval,
            clock,
        )
        .ok_or(DispenserError::SensorTimeout {
            phase: EchoPhase::Fall,
        })?;

        let cm = pulse_to_cm(width, self.cfg.speed_cm_s);
        tracing::trace!(pulse_us = width.as_micros() as u64, cm, "echo");
        Ok(cm)
    }
}
