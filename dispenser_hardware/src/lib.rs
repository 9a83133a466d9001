//! Peripheral implementations for the dispenser controller.
//!
//! Simulations for off-target runs, a software RTC and host networking are
//! always built; Raspberry Pi GPIO, PWM and the SPI ADC need feature `hardware`.

pub mod error;
pub mod net;
pub mod rtc;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use net::{ThreadResolver, UdpDatagram};
pub use rtc::SoftRtc;
