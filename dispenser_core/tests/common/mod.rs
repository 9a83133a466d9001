#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dispenser_core::{DistanceCfg, Notice, TickReport};
use dispenser_core::Dispenser;
use dispenser_hardware::SoftRtc;
use dispenser_hardware::sim::{
    SimButton, SimJoystick, SimNtpServer, SimPin, SimPwm, SimRanger, StaticResolver,
};
use dispenser_traits::{Clock, Resolver};
use dispenser_traits::clock::test_clock::TestClock;

/// 2025-02-21 17:30:00 UTC, 14:30:00 at UTC-3.
pub const FRIDAY_1430: u32 = 3_949_147_800;

pub struct Rig {
    pub clock: TestClock,
    pub rtc: SoftRtc,
    pub ranger: SimRanger,
    pub button: SimButton,
    pub joystick: SimJoystick,
    pub presence: SimPin,
    pub buzzer: SimPwm,
    pub servo: SimPwm,
    pub ntp: SimNtpServer,
    pub dispenser: Dispenser,
}

pub fn server() -> SocketAddr {
    "192.0.2.1:123".parse().unwrap()
}

pub fn rig_with(ntp: SimNtpServer, resolver: impl Resolver + 'static) -> Rig {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let rtc = SoftRtc::new(shared.clone());
    let ranger = SimRanger::new(shared.clone(), None);
    let button = SimButton::new();
    let joystick = SimJoystick::new();
    let presence = SimPin::new(true);
    let buzzer = SimPwm::new();
    let servo = SimPwm::new();
    let dispenser = Dispenser::builder()
        .with_clock(shared)
        .with_ranger(ranger.trigger(), ranger.echo())
        .with_button(button.clone())
        .with_joystick(joystick.clone())
        .with_presence(presence.clone())
        .with_buzzer(buzzer.clone())
        .with_servo(servo.clone())
        .with_rtc(rtc.clone())
        .with_network(ntp.clone(), resolver)
        .with_distance(DistanceCfg {
            poll_interval: Duration::from_micros(5),
            ..DistanceCfg::default()
        })
        .try_build()
        .expect("all peripherals supplied");
    Rig {
        clock,
        rtc,
        ranger,
        button,
        joystick,
        presence,
        buzzer,
        servo,
        ntp,
        dispenser,
    }
}

pub fn rig() -> Rig {
    rig_with(SimNtpServer::fixed(FRIDAY_1430), StaticResolver::new(server()))
}

impl Rig {
    pub fn started(mut self) -> Self {
        self.dispenser.start().expect("start");
        self
    }

    pub fn tick(&mut self) -> TickReport {
        self.dispenser.tick().expect("tick")
    }

    pub fn press(&mut self) -> TickReport {
        self.button.tap();
        self.tick()
    }

    pub fn monitor_rows(report: &TickReport) -> Vec<&Notice> {
        report
            .notices
            .iter()
            .filter(|n| matches!(n, Notice::Monitor { .. }))
            .collect()
    }
}
