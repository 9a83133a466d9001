//! The control automaton (`Dispenser`).
//!
//! One `tick()` runs three phases in order:
//! 1. network: consume at most one queued event, then drain the socket; a
//!    committed sync reply moves `Initial` to `ShowTime`,
//! 2. clock health: read the RTC, reinitialise once on failure,
//! 3. the action of the current state, which may move the state again.
//!
//! The only blocking waits are the button release and the two echo edges,
//! all bounded.

use std::sync::Arc;
use std::time::Duration;

use dispenser_traits::{
    AlarmMatch, AnalogInput, Clock, DatagramSocket, DigitalInput, RealTimeClock, Resolver,
};
use eyre::WrapErr;

use crate::actuator::{Actuators, Sample, Transition};
use crate::config::TimingCfg;
use crate::distance::DistanceSensor;
use crate::error::{DispenserError, Result};
use crate::events::{Event, EventQueue};
use crate::hw_error::map_hw_error;
use crate::input::{AxisThresholds, Button};
use crate::state::{ActuatorState, AlarmTime, Input, SystemState, transition};
use crate::status::{ClockHealth, Notice, Presence, TickReport};
use crate::time_sync::{SyncPhase, TimeSync};

pub struct Dispenser {
    pub(crate) state: SystemState,
    pub(crate) alarm: AlarmTime,
    pub(crate) actuator_state: ActuatorState,
    pub(crate) sensor: DistanceSensor,
    pub(crate) actuators: Actuators,
    pub(crate) button: Button,
    pub(crate) joystick: Box<dyn AnalogInput>,
    pub(crate) axis: AxisThresholds,
    pub(crate) presence: Box<dyn DigitalInput>,
    pub(crate) rtc: Box<dyn RealTimeClock>,
    pub(crate) socket: Box<dyn DatagramSocket>,
    pub(crate) resolver: Box<dyn Resolver>,
    pub(crate) sync: TimeSync,
    pub(crate) events: EventQueue,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) timing: TimingCfg,
    pub(crate) synced: bool,
    pub(crate) started: bool,
}

impl core::fmt::Debug for Dispenser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispenser")
            .field("state", &self.state)
            .field("alarm", &self.alarm)
            .field("actuator_state", &self.actuator_state)
            .field("sync", &self.sync.phase())
            .finish()
    }
}

impl Dispenser {
    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn alarm(&self) -> AlarmTime {
        self.alarm
    }

    pub fn actuator_state(&self) -> ActuatorState {
        self.actuator_state
    }

    pub fn sync_phase(&self) -> SyncPhase {
        self.sync.phase()
    }

    pub fn arm_angle(&self) -> u8 {
        self.actuators.arm_angle()
    }

    pub fn buzzer_sounding(&self) -> bool {
        self.actuators.buzzer_sounding()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Pause after a tick whose action ran in `state`.
    pub fn dwell_for(&self, state: SystemState) -> Duration {
        match state {
            SystemState::Initial => self.timing.idle,
            SystemState::AskAlarm | SystemState::SetAlarmHours | SystemState::SetAlarmMinutes => {
                self.timing.prompt
            }
            SystemState::AlarmSet => self.timing.armed,
            SystemState::Monitoring => self.timing.monitor,
            SystemState::ShowTime | SystemState::AlarmTriggered => Duration::ZERO,
        }
    }

    /// Put the actuators in their boot positions and start the time sync.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.actuators.init()?;
        self.sync.start(&mut *self.resolver, &self.events.sender());
        self.started = true;
        tracing::info!(state = %self.state, "dispenser started");
        Ok(())
    }

    /// Silence the buzzer, park the arm, drop any armed alarm.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Err(e) = self.rtc.disable_alarm() {
            tracing::warn!(error = %e, "disable_alarm failed on shutdown");
        }
        self.actuators.park().wrap_err("parking actuators")?;
        tracing::info!(state = %self.state, "dispenser parked");
        Ok(())
    }

    fn enter(&mut self, input: Input, path: &mut Vec<SystemState>) {
        let next = transition(self.state, input);
        if next != self.state {
            tracing::info!(from = %self.state, to = %next, ?input, "state change");
            self.state = next;
            path.push(next);
        }
    }

    pub fn tick(&mut self) -> Result<TickReport> {
        if !self.started {
            return Err(eyre::Report::new(DispenserError::State(
                "tick before start".into(),
            )));
        }
        let mut path = vec![self.state];
        let mut notices = Vec::new();

        // 1. network and callbacks
        let input = self.poll_network(&mut notices);
        self.enter(input, &mut path);

        // 2. clock health
        let clock = self.check_clock(&mut notices);

        // 3. state action
        let acted_in = self.state;
        let input = self.act(&mut notices)?;
        self.enter(input, &mut path);

        Ok(TickReport {
            path,
            acted_in,
            notices,
            clock,
            dwell: self.dwell_for(acted_in),
        })
    }

    fn poll_network(&mut self, notices: &mut Vec<Notice>) -> Input {
        let mut input = Input::Idle;
        match self.events.try_next() {
            Some(Event::ServerResolved(addr)) => {
                if let Err(e) = self.sync.on_resolved(addr, &mut *self.socket, self.clock.now()) {
                    tracing::warn!(error = %e, "time sync abandoned");
                }
            }
            Some(Event::ResolveFailed(reason)) => {
                let e = self.sync.on_resolve_failed(&reason);
                tracing::warn!(error = %e, "time sync abandoned");
            }
            Some(Event::AlarmFired) => {
                if let Err(e) = self.rtc.disable_alarm() {
                    tracing::warn!(error = %e, "disable_alarm failed after fire");
                }
                if self.state == SystemState::AlarmSet {
                    notices.push(Notice::AlarmFired);
                    input = Input::AlarmFired;
                } else {
                    tracing::debug!(state = %self.state, "alarm fired outside AlarmSet; ignored");
                }
            }
            None => {}
        }

        match self.sync.poll(&mut *self.socket, self.clock.now()) {
            Ok(Some(t)) => match self.rtc.set_datetime(t) {
                Ok(()) => {
                    self.synced = true;
                    tracing::info!(time = %t, "clock synchronised");
                    notices.push(Notice::ClockSynced {
                        time: t,
                        zone_offset_s: self.sync.cfg().zone_offset_s,
                    });
                    if input == Input::Idle {
                        input = Input::Synced;
                    }
                }
                Err(e) => {
                    let e = map_hw_error(&*e, None);
                    tracing::error!(error = %e, "could not commit time to the rtc");
                }
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "time sync receive failed"),
        }
        input
    }

    fn check_clock(&mut self, notices: &mut Vec<Notice>) -> ClockHealth {
        let first = match self.rtc.datetime() {
            Ok(_) => return ClockHealth::Ok,
            Err(e) => map_hw_error(&*e, None),
        };
        if let Err(e) = self.rtc.reinit() {
            tracing::debug!(error = %e, "rtc reinit failed");
        }
        match self.rtc.datetime() {
            Ok(t) => {
                tracing::warn!(error = %first, time = %t, "rtc read failed; recovered after reinit");
                notices.push(Notice::ClockRecovered(t));
                ClockHealth::Recovered
            }
            Err(e) => {
                let e = map_hw_error(&*e, None);
                if self.synced {
                    tracing::warn!(error = %e, "rtc unreadable after reinit");
                } else {
                    tracing::debug!(error = %e, "rtc not readable before sync");
                }
                ClockHealth::Failed
            }
        }
    }

    fn act(&mut self, notices: &mut Vec<Notice>) -> Result<Input> {
        match self.state {
            SystemState::Initial | SystemState::AlarmSet => Ok(Input::Idle),
            SystemState::ShowTime => {
                match self.rtc.datetime() {
                    Ok(t) => notices.push(Notice::Time(t)),
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot read current time");
                        notices.push(Notice::TimeUnavailable);
                    }
                }
                notices.push(Notice::PromptAlarm);
                Ok(Input::Idle)
            }
            SystemState::AskAlarm => {
                if !self.button.take_press() {
                    return Ok(Input::Idle);
                }
                match self.rtc.datetime() {
                    Ok(t) => {
                        self.alarm = AlarmTime::seeded_from(&t);
                        notices.push(Notice::AlarmSeed(self.alarm));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot read time for alarm seed; using 00:00");
                        self.alarm = AlarmTime::default();
                        notices.push(Notice::SeedUnavailable);
                    }
                }
                notices.push(Notice::PromptHours);
                notices.push(Notice::AlarmValue(self.alarm));
                Ok(Input::Confirm)
            }
            SystemState::SetAlarmHours => {
                if let Some(sample) = self.read_axis()
                    && self.axis.interpret(sample, &mut self.alarm.hours).is_some()
                {
                    notices.push(Notice::AlarmValue(self.alarm));
                }
                if !self.button.take_press() {
                    return Ok(Input::Idle);
                }
                notices.push(Notice::PromptMinutes);
                Ok(Input::Confirm)
            }
            SystemState::SetAlarmMinutes => {
                if let Some(sample) = self.read_axis()
                    && self.axis.interpret(sample, &mut self.alarm.minutes).is_some()
                {
                    notices.push(Notice::AlarmValue(self.alarm));
                }
                if !self.button.take_press() {
                    return Ok(Input::Idle);
                }
                notices.push(Notice::ArmingAlarm(self.alarm));
                self.arm_alarm()?;
                notices.push(Notice::AlarmArmed);
                Ok(Input::Confirm)
            }
            SystemState::AlarmTriggered => {
                self.actuator_state.reset();
                let was_sounding = self.actuators.buzzer_sounding();
                self.actuators.sound_alarm(&mut self.actuator_state)?;
                if !was_sounding {
                    notices.push(Notice::BuzzerOn);
                }
                Ok(Input::Idle)
            }
            SystemState::Monitoring => self.monitor(notices),
        }
    }

    fn read_axis(&mut self) -> Option<u16> {
        match self.joystick.read() {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %map_hw_error(&*e, None), "joystick read failed");
                None
            }
        }
    }

    fn arm_alarm(&mut self) -> Result<()> {
        let h = self.alarm.hours.value();
        let m = self.alarm.minutes.value();
        self.rtc
            .disable_alarm()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err("disabling previous alarm")?;
        let tx = self.events.sender();
        self.rtc
            .set_alarm(
                AlarmMatch::daily(h, m, 0),
                Box::new(move || tx.send(Event::AlarmFired)),
            )
            .map_err(|e| eyre::Report::new(map_hw_error(&*e, None)))
            .wrap_err_with(|| format!("arming alarm for {h:02}:{m:02}:00"))?;
        tracing::info!(alarm = %self.alarm, "alarm armed");
        Ok(())
    }

    fn monitor(&mut self, notices: &mut Vec<Notice>) -> Result<Input> {
        let reading = self.sensor.measure();
        if let Err(e) = &reading {
            tracing::warn!(error = %e, "distance reading skipped");
        }
        let sample = Sample::classify(reading, self.sensor.cfg().max_range_cm);
        if let Sample::OutOfRange(cm) = sample {
            tracing::debug!(cm, "reading out of range");
        }

        let was_sounding = self.actuators.buzzer_sounding();
        let t = self.actuators.step(&mut self.actuator_state, sample)?;
        if was_sounding && !self.actuators.buzzer_sounding() {
            notices.push(Notice::BuzzerOff);
        }

        let presence = if self.actuator_state.presence_monitoring {
            if self.presence.is_high() {
                Presence::NotTaken
            } else {
                Presence::Taken
            }
        } else {
            Presence::Disabled
        };
        notices.push(Notice::Monitor {
            distance_cm: sample.distance(),
            arm_angle: self.actuators.arm_angle(),
            presence,
        });

        if t == Transition::Retract {
            self.actuator_state.reset();
            Ok(Input::CycleComplete)
        } else {
            Ok(Input::Idle)
        }
    }
}
