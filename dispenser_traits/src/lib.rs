pub mod clock;
pub mod rtc;

pub use clock::{Clock, MonotonicClock};
pub use rtc::{AlarmCallback, AlarmMatch, CivilTime, RealTimeClock};

use std::net::SocketAddr;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub trait DigitalInput {
    fn is_high(&self) -> bool;
}

pub trait DigitalOutput {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Single-channel ADC. Samples are right-aligned 12-bit values (0..=4095).
pub trait AnalogInput {
    fn read(&mut self) -> Result<u16, BoxError>;
}

/// PWM output with a configurable carrier. Duty cycles are fractions in [0.0, 1.0].
pub trait PwmOutput {
    fn configure(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<(), BoxError>;
    fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), BoxError>;
}

pub trait DatagramSocket {
    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> Result<(), BoxError>;
    /// Non-blocking receive; `Ok(None)` when no datagram is queued.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, BoxError>;
}

pub type ResolveCallback = Box<dyn FnOnce(Result<SocketAddr, BoxError>) + Send>;

/// Hostname lookup that reports its result through a callback, possibly
/// from another thread.
pub trait Resolver {
    fn resolve(&mut self, host: &str, port: u16, on_done: ResolveCallback);
}

// Boxed devices are devices too, so assemblies can pick a backend at runtime.

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn set_high(&mut self) {
        (**self).set_high();
    }
    fn set_low(&mut self) {
        (**self).set_low();
    }
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read(&mut self) -> Result<u16, BoxError> {
        (**self).read()
    }
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn configure(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<(), BoxError> {
        (**self).configure(frequency_hz, duty_cycle)
    }
    fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), BoxError> {
        (**self).set_duty_cycle(duty_cycle)
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for Box<T> {
    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> Result<(), BoxError> {
        (**self).send_to(payload, addr)
    }
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, BoxError> {
        (**self).try_recv(buf)
    }
}

impl<T: Resolver + ?Sized> Resolver for Box<T> {
    fn resolve(&mut self, host: &str, port: u16, on_done: ResolveCallback) {
        (**self).resolve(host, port, on_done);
    }
}
