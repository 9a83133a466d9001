//! Simulated peripherals for running the controller off-target and in tests.
//!
//! Every simulated device hands out cheap clones that share state, so a test
//! can keep a handle while the controller owns the device.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dispenser_traits::{
    AnalogInput, BoxError, Clock, DatagramSocket, DigitalInput, DigitalOutput, PwmOutput,
    ResolveCallback, Resolver,
};
use tracing::trace;

use crate::error::HwError;

/// Digital line whose level is set from the outside (button, presence sensor).
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }
}

impl DigitalInput for SimPin {
    fn is_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

impl DigitalOutput for SimPin {
    fn set_high(&mut self) {
        self.set(true);
    }
    fn set_low(&mut self) {
        self.set(false);
    }
}

/// Active-low push button that stays pressed for a fixed number of reads
/// and then releases, the way a finger would during a blocking release wait.
#[derive(Debug, Clone, Default)]
pub struct SimButton {
    reads_until_release: Arc<Mutex<u32>>,
}

impl SimButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the button down for `reads` level reads.
    pub fn press_for(&self, reads: u32) {
        if let Ok(mut n) = self.reads_until_release.lock() {
            *n = reads;
        }
    }

    /// A short press: seen pressed once, released on the next read.
    pub fn tap(&self) {
        self.press_for(1);
    }
}

impl DigitalInput for SimButton {
    fn is_high(&self) -> bool {
        let Ok(mut n) = self.reads_until_release.lock() else {
            return true;
        };
        if *n == 0 {
            return true;
        }
        *n -= 1;
        false
    }
}

/// Joystick axis: queued samples are returned first, then the rest position.
#[derive(Debug, Clone)]
pub struct SimJoystick {
    queued: Arc<Mutex<VecDeque<u16>>>,
    rest: Arc<AtomicU16>,
}

/// Rest reading of a centered analog stick.
pub const JOYSTICK_CENTER: u16 = 1981;

impl Default for SimJoystick {
    fn default() -> Self {
        Self {
            queued: Arc::new(Mutex::new(VecDeque::new())),
            rest: Arc::new(AtomicU16::new(JOYSTICK_CENTER)),
        }
    }
}

impl SimJoystick {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: u16) {
        if let Ok(mut q) = self.queued.lock() {
            q.push_back(sample);
        }
    }

    pub fn set_rest(&self, sample: u16) {
        self.rest.store(sample, Ordering::Relaxed);
    }
}

impl AnalogInput for SimJoystick {
    fn read(&mut self) -> Result<u16, BoxError> {
        let next = self
            .queued
            .lock()
            .map_err(|_| HwError::Spi("joystick queue poisoned".into()))?
            .pop_front();
        Ok(next.unwrap_or_else(|| self.rest.load(Ordering::Relaxed)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PwmState {
    pub frequency_hz: f64,
    pub duty_cycle: f64,
    pub writes: usize,
}

/// PWM output that records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    state: Arc<Mutex<PwmState>>,
}

impl SimPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PwmState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }
}

impl PwmOutput for SimPwm {
    fn configure(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Gpio("pwm state poisoned".into()))?;
        s.frequency_hz = frequency_hz;
        s.duty_cycle = duty_cycle;
        s.writes += 1;
        Ok(())
    }

    fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Gpio("pwm state poisoned".into()))?;
        s.duty_cycle = duty_cycle;
        s.writes += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct RangerState {
    distance_cm: Option<f32>,
    trigger_high: bool,
    fired_at: Option<Instant>,
    echo_delay: Duration,
    speed_cm_s: f32,
}

/// Ultrasonic ranger: a falling trigger edge schedules an echo pulse whose
/// width encodes the configured distance. `None` means no echo ever arrives.
#[derive(Clone)]
pub struct SimRanger {
    state: Arc<Mutex<RangerState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimRanger {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, distance_cm: Option<f32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RangerState {
                distance_cm,
                trigger_high: false,
                fired_at: None,
                echo_delay: Duration::from_micros(200),
                speed_cm_s: 34_300.0,
            })),
            clock,
        }
    }

    pub fn set_distance(&self, distance_cm: Option<f32>) {
        if let Ok(mut s) = self.state.lock() {
            s.distance_cm = distance_cm;
        }
    }

    pub fn trigger(&self) -> RangerTrigger {
        RangerTrigger(self.clone())
    }

    pub fn echo(&self) -> RangerEcho {
        RangerEcho(self.clone())
    }
}

pub struct RangerTrigger(SimRanger);

impl DigitalOutput for RangerTrigger {
    fn set_high(&mut self) {
        if let Ok(mut s) = self.0.state.lock() {
            s.trigger_high = true;
        }
    }

    fn set_low(&mut self) {
        let now = self.0.clock.now();
        if let Ok(mut s) = self.0.state.lock() {
            if s.trigger_high {
                s.fired_at = Some(now);
            }
            s.trigger_high = false;
        }
    }
}

pub struct RangerEcho(SimRanger);

impl DigitalInput for RangerEcho {
    fn is_high(&self) -> bool {
        let now = self.0.clock.now();
        let Ok(s) = self.0.state.lock() else {
            return false;
        };
        let (Some(fired), Some(cm)) = (s.fired_at, s.distance_cm) else {
            return false;
        };
        let width_us = f64::from(cm) * 2_000_000.0 / f64::from(s.speed_cm_s);
        let start = fired + s.echo_delay;
        let end = start + Duration::from_nanos((width_us * 1_000.0) as u64);
        now >= start && now < end
    }
}

/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_UNIX_DELTA: u64 = 2_208_988_800;

#[derive(Default)]
struct NtpState {
    inbox: VecDeque<Vec<u8>>,
    requests: usize,
    silent: bool,
}

/// Time server reachable through the `DatagramSocket` interface; every
/// well-formed client request queues one server reply.
#[derive(Clone)]
pub struct SimNtpServer {
    state: Arc<Mutex<NtpState>>,
    transmit_seconds: Arc<dyn Fn() -> u32 + Send + Sync>,
}

impl SimNtpServer {
    /// Answer with a fixed transmit timestamp (seconds since 1900).
    pub fn fixed(ntp_seconds: u32) -> Self {
        Self::with_source(move || ntp_seconds)
    }

    /// Answer with the host's wall clock.
    pub fn host_time() -> Self {
        Self::with_source(|| {
            let unix = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            // NTP era rollover: keep the low 32 bits
            (unix + NTP_UNIX_DELTA) as u32
        })
    }

    pub fn with_source(source: impl Fn() -> u32 + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(NtpState::default())),
            transmit_seconds: Arc::new(source),
        }
    }

    /// Accept requests but never answer.
    pub fn silent(self) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.silent = true;
        }
        self
    }

    /// Queue an arbitrary datagram for the client to receive.
    pub fn inject(&self, datagram: Vec<u8>) {
        if let Ok(mut s) = self.state.lock() {
            s.inbox.push_back(datagram);
        }
    }

    pub fn requests(&self) -> usize {
        self.state.lock().map(|s| s.requests).unwrap_or(0)
    }

    /// Build a 48-byte server reply carrying `ntp_seconds` as transmit time.
    pub fn reply(ntp_seconds: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 48];
        buf[0] = 0x1C; // LI 0, VN 3, mode 4 (server)
        buf[1] = 1; // stratum
        buf[40..44].copy_from_slice(&ntp_seconds.to_be_bytes());
        buf
    }
}

impl DatagramSocket for SimNtpServer {
    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Io(std::io::Error::other("ntp state poisoned")))?;
        s.requests += 1;
        trace!(%addr, len = payload.len(), "sim ntp request");
        let is_client = payload.len() >= 48 && payload[0] & 0x07 == 3;
        if is_client && !s.silent {
            let secs = (self.transmit_seconds)();
            s.inbox.push_back(Self::reply(secs));
        }
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Io(std::io::Error::other("ntp state poisoned")))?;
        Ok(s.inbox.pop_front().map(|d| {
            let n = d.len().min(buf.len());
            buf[..n].copy_from_slice(&d[..n]);
            n
        }))
    }
}

/// Resolver that answers immediately, on the caller's thread.
#[derive(Debug, Clone, Copy)]
pub struct StaticResolver {
    addr: Option<SocketAddr>,
}

impl StaticResolver {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr: Some(addr) }
    }

    /// A resolver for which every lookup fails.
    pub fn unreachable() -> Self {
        Self { addr: None }
    }
}

impl Resolver for StaticResolver {
    fn resolve(&mut self, host: &str, _port: u16, on_done: ResolveCallback) {
        match self.addr {
            Some(addr) => on_done(Ok(addr)),
            None => on_done(Err(Box::new(HwError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot resolve {host}"),
            ))))),
        }
    }
}
