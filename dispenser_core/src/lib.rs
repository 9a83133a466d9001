#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control automaton of the medication dispenser (hardware-agnostic).
//!
//! All hardware interactions go through the capability traits in
//! `dispenser_traits`; simulations and Raspberry Pi drivers live in
//! `dispenser_hardware`.
//!
//! ## Architecture
//!
//! - **Distance**: echo-timing ultrasonic measurement (`distance`)
//! - **Input**: joystick axis interpretation and the confirm button (`input`)
//! - **Time sync**: one-shot SNTP exchange (`time_sync`)
//! - **Actuators**: buzzer and dispenser arm with hysteresis (`actuator`)
//! - **Automaton**: the state table (`state`) and the tick loop (`automaton`, `runner`)
//!
//! Asynchronous callbacks (resolver, RTC alarm) only publish into an
//! `events::EventQueue`; every other piece of state is owned by `Dispenser`.

pub mod actuator;
pub mod automaton;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod distance;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod input;
pub mod runner;
pub mod state;
pub mod status;
pub mod time_sync;
pub mod util;

pub use actuator::{Actuators, Sample, Transition};
pub use automaton::Dispenser;
pub use builder::DispenserBuilder;
pub use config::{ActuatorCfg, DistanceCfg, InputCfg, SyncCfg, TimingCfg};
pub use distance::DistanceSensor;
pub use error::{BuildError, DispenserError, EchoPhase, Report, Result};
pub use input::{AxisThresholds, BoundedField, ChangeEvent, interpret_axis};
pub use state::{ActuatorState, AlarmTime, Input, SystemState, transition};
pub use status::{ClockHealth, Notice, Presence, TickReport};
pub use time_sync::{SyncPhase, TimeSync};
