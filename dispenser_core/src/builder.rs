//! Builder for `Dispenser`.
//!
//! Every peripheral must be supplied; `try_build()` names the first missing
//! one. Configuration sections default to the stock wiring when omitted.

use std::sync::Arc;

use dispenser_traits::clock::{Clock, MonotonicClock};
use dispenser_traits::{
    AnalogInput, DatagramSocket, DigitalInput, DigitalOutput, PwmOutput, RealTimeClock, Resolver,
};

use crate::actuator::Actuators;
use crate::automaton::Dispenser;
use crate::config::*;
use crate::distance::DistanceSensor;
use crate::error::{BuildError, Result};
use crate::events::EventQueue;
use crate::input::{AxisThresholds, Button};
use crate::state::{ActuatorState, AlarmTime, SystemState};
use crate::time_sync::TimeSync;

fn positive(x: f32) -> bool {
    x.is_finite() && x > 0.0
}

impl Dispenser {
    /// Start building a Dispenser.
    pub fn builder() -> DispenserBuilder {
        DispenserBuilder::default()
    }
}

#[derive(Default)]
pub struct DispenserBuilder {
    trigger: Option<Box<dyn DigitalOutput>>,
    echo: Option<Box<dyn DigitalInput>>,
    button: Option<Box<dyn DigitalInput>>,
    joystick: Option<Box<dyn AnalogInput>>,
    presence: Option<Box<dyn DigitalInput>>,
    buzzer: Option<Box<dyn PwmOutput>>,
    servo: Option<Box<dyn PwmOutput>>,
    rtc: Option<Box<dyn RealTimeClock>>,
    socket: Option<Box<dyn DatagramSocket>>,
    resolver: Option<Box<dyn Resolver>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    input: Option<InputCfg>,
    distance: Option<DistanceCfg>,
    actuator: Option<ActuatorCfg>,
    sync: Option<SyncCfg>,
    timing: Option<TimingCfg>,
}

impl DispenserBuilder {
    pub fn with_ranger(
        mut self,
        trigger: impl DigitalOutput + 'static,
        echo: impl DigitalInput + 'static,
    ) -> Self {
        self.trigger = Some(Box::new(trigger));
        self.echo = Some(Box::new(echo));
        self
    }
    pub fn with_button(mut self, pin: impl DigitalInput + 'static) -> Self {
        self.button = Some(Box::new(pin));
        self
    }
    pub fn with_joystick(mut self, axis: impl AnalogInput + 'static) -> Self {
        self.joystick = Some(Box::new(axis));
        self
    }
    pub fn with_presence(mut self, pin: impl DigitalInput + 'static) -> Self {
        self.presence = Some(Box::new(pin));
        self
    }
    pub fn with_buzzer(mut self, pwm: impl PwmOutput + 'static) -> Self {
        self.buzzer = Some(Box::new(pwm));
        self
    }
    pub fn with_servo(mut self, pwm: impl PwmOutput + 'static) -> Self {
        self.servo = Some(Box::new(pwm));
        self
    }
    pub fn with_rtc(mut self, rtc: impl RealTimeClock + 'static) -> Self {
        self.rtc = Some(Box::new(rtc));
        self
    }
    pub fn with_network(
        mut self,
        socket: impl DatagramSocket + 'static,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.socket = Some(Box::new(socket));
        self.resolver = Some(Box::new(resolver));
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_input(mut self, cfg: InputCfg) -> Self {
        self.input = Some(cfg);
        self
    }
    pub fn with_distance(mut self, cfg: DistanceCfg) -> Self {
        self.distance = Some(cfg);
        self
    }
    pub fn with_actuator(mut self, cfg: ActuatorCfg) -> Self {
        self.actuator = Some(cfg);
        self
    }
    pub fn with_sync(mut self, cfg: SyncCfg) -> Self {
        self.sync = Some(cfg);
        self
    }
    pub fn with_timing(mut self, cfg: TimingCfg) -> Self {
        self.timing = Some(cfg);
        self
    }

    /// Take every tunable section from a loaded config file.
    pub fn with_config(self, cfg: &dispenser_config::Config) -> Self {
        self.with_input((&cfg.input).into())
            .with_distance((&cfg.distance).into())
            .with_actuator((&cfg.actuator).into())
            .with_sync((&cfg.time_sync).into())
            .with_timing((&cfg.timing).into())
    }

    pub fn try_build(self) -> Result<Dispenser> {
        fn need<T>(v: Option<T>, name: &'static str) -> Result<T> {
            v.ok_or_else(|| eyre::Report::new(BuildError::MissingPeripheral(name)))
        }
        let trigger = need(self.trigger, "ranger trigger")?;
        let echo = need(self.echo, "ranger echo")?;
        let button = need(self.button, "button")?;
        let joystick = need(self.joystick, "joystick")?;
        let presence = need(self.presence, "presence sensor")?;
        let buzzer = need(self.buzzer, "buzzer")?;
        let servo = need(self.servo, "servo")?;
        let rtc = need(self.rtc, "real-time clock")?;
        let socket = need(self.socket, "datagram socket")?;
        let resolver = need(self.resolver, "resolver")?;

        let input = self.input.unwrap_or_default();
        let distance = self.distance.unwrap_or_default();
        let actuator = self.actuator.unwrap_or_default();
        let sync = self.sync.unwrap_or_default();
        let timing = self.timing.unwrap_or_default();

        // ── Validation ───────────────────────────────────────────────────────
        if input.down_threshold >= input.up_threshold {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "joystick down threshold must be below the up threshold",
            )));
        }
        if distance.timeout.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "echo timeout must be > 0",
            )));
        }
        if !positive(distance.speed_cm_s) || !positive(distance.max_range_cm) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "speed of sound and max range must be > 0",
            )));
        }
        if !positive(actuator.threshold_cm) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "distance threshold must be > 0",
            )));
        }
        if actuator.servo_min_us >= actuator.servo_max_us {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "servo min pulse must be below max pulse",
            )));
        }
        if sync.server.trim().is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "time server must not be empty",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(Dispenser {
            state: SystemState::Initial,
            alarm: AlarmTime::default(),
            actuator_state: ActuatorState::default(),
            sensor: DistanceSensor::new(trigger, echo, clock.clone(), distance),
            actuators: Actuators::new(buzzer, servo, actuator),
            button: Button::new(button, clock.clone(), input),
            joystick,
            axis: AxisThresholds::from(&input),
            presence,
            rtc,
            socket,
            resolver,
            sync: TimeSync::new(sync),
            events: EventQueue::new(),
            clock,
            timing,
            synced: false,
            started: false,
        })
    }
}
