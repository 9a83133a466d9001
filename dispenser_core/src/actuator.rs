//! Buzzer and dispenser arm, with the hysteresis that moves the arm.

use dispenser_traits::PwmOutput;
use eyre::WrapErr;

use crate::config::ActuatorCfg;
use crate::error::{DispenserError, Result};
use crate::hw_error::map_hw_error;
use crate::state::ActuatorState;
use crate::util::servo_pulse_us;

/// One distance reading, classified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    InRange(f32),
    /// Non-positive or beyond the sensor's range: nothing is there.
    OutOfRange(f32),
    Timeout,
}

impl Sample {
    pub fn classify(reading: core::result::Result<f32, DispenserError>, max_range_cm: f32) -> Self {
        match reading {
            Ok(cm) if cm > 0.0 && cm <= max_range_cm => Self::InRange(cm),
            Ok(cm) => Self::OutOfRange(cm),
            Err(_) => Self::Timeout,
        }
    }

    /// The distance, if it is usable.
    pub fn distance(&self) -> Option<f32> {
        match self {
            Self::InRange(cm) => Some(*cm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Arm to the dispense angle, buzzer off, presence monitoring on.
    Extend,
    /// Arm back to idle, presence monitoring off; the cycle is complete.
    Retract,
    Hold,
}

/// Single-threshold hysteresis: the arm extends at or below the threshold
/// and only retracts once a reading is strictly above it.
pub fn plan(state: &ActuatorState, sample: Sample, threshold_cm: f32) -> Transition {
    match sample {
        Sample::InRange(cm) if cm <= threshold_cm && !state.servo_extended => Transition::Extend,
        Sample::InRange(cm) if cm > threshold_cm && state.servo_extended => Transition::Retract,
        _ => Transition::Hold,
    }
}

pub struct Actuators {
    buzzer: Box<dyn PwmOutput>,
    servo: Box<dyn PwmOutput>,
    cfg: ActuatorCfg,
    sounding: bool,
    arm_angle: u8,
}

impl Actuators {
    pub fn new(buzzer: Box<dyn PwmOutput>, servo: Box<dyn PwmOutput>, cfg: ActuatorCfg) -> Self {
        Self {
            buzzer,
            servo,
            arm_angle: cfg.idle_angle,
            cfg,
            sounding: false,
        }
    }

    pub fn cfg(&self) -> &ActuatorCfg {
        &self.cfg
    }

    /// Boot positions: silent buzzer carrier, arm at idle.
    pub fn init(&mut self) -> Result<()> {
        self.buzzer
            .configure(self.cfg.buzzer_hz, 0.0)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err("buzzer init")?;
        self.sounding = false;
        let duty = self.servo_duty(self.cfg.idle_angle);
        self.servo
            .configure(self.cfg.servo_hz, duty)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err("servo init")?;
        self.arm_angle = self.cfg.idle_angle;
        tracing::debug!(
            buzzer_hz = self.cfg.buzzer_hz,
            servo_hz = self.cfg.servo_hz,
            "actuators at boot positions"
        );
        Ok(())
    }

    /// Servo duty cycle for `angle` at the configured frame rate.
    pub fn servo_duty(&self, angle: u8) -> f64 {
        let pulse = servo_pulse_us(angle, self.cfg.servo_min_us, self.cfg.servo_max_us);
        f64::from(pulse) * self.cfg.servo_hz / 1_000_000.0
    }

    pub fn arm_angle(&self) -> u8 {
        self.arm_angle
    }

    pub fn buzzer_sounding(&self) -> bool {
        self.sounding
    }

    pub fn buzzer_on(&mut self) -> Result<()> {
        if self.sounding {
            return Ok(());
        }
        self.buzzer
            .set_duty_cycle(self.cfg.buzzer_duty)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err("buzzer on")?;
        self.sounding = true;
        tracing::info!("buzzer on");
        Ok(())
    }

    pub fn buzzer_off(&mut self) -> Result<()> {
        if !self.sounding {
            return Ok(());
        }
        self.buzzer
            .set_duty_cycle(0.0)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err("buzzer off")?;
        self.sounding = false;
        tracing::info!("buzzer off");
        Ok(())
    }

    pub fn move_arm(&mut self, angle: u8) -> Result<()> {
        let duty = self.servo_duty(angle);
        self.servo
            .set_duty_cycle(duty)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err_with(|| format!("servo to {angle} deg"))?;
        self.arm_angle = angle;
        tracing::debug!(angle, duty, "arm moved");
        Ok(())
    }

    /// Start the alarm tone for a fresh dispensing cycle.
    pub fn sound_alarm(&mut self, state: &mut ActuatorState) -> Result<()> {
        self.buzzer_on()?;
        state.buzzer_on = true;
        Ok(())
    }

    /// Apply one reading to the arm and buzzer.
    pub fn step(&mut self, state: &mut ActuatorState, sample: Sample) -> Result<Transition> {
        let t = plan(state, sample, self.cfg.threshold_cm);
        match t {
            Transition::Extend => {
                self.move_arm(self.cfg.dispense_angle)?;
                self.buzzer_off()?;
                state.servo_extended = true;
                state.buzzer_on = false;
                state.presence_monitoring = true;
                tracing::info!(distance_cm = ?sample.distance(), "dispensing");
            }
            Transition::Retract => {
                self.move_arm(self.cfg.idle_angle)?;
                state.servo_extended = false;
                state.presence_monitoring = false;
                tracing::info!(distance_cm = ?sample.distance(), "arm retracted");
            }
            Transition::Hold => {}
        }
        Ok(t)
    }

    /// Silence the buzzer and return the arm to idle.
    pub fn park(&mut self) -> Result<()> {
        self.buzzer_off()?;
        self.move_arm(self.cfg.idle_angle)
    }
}
