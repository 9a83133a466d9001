//! Raspberry Pi peripherals through rppal.

use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use dispenser_traits::{AnalogInput, BoxError, DigitalInput, DigitalOutput, PwmOutput};

use crate::error::{HwError, Result};

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

pub struct RpiInput(InputPin);

impl RpiInput {
    pub fn pull_up(pin: u8) -> Result<Self> {
        let p = gpio()?.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self(p.into_input_pullup()))
    }

    pub fn pull_down(pin: u8) -> Result<Self> {
        let p = gpio()?.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self(p.into_input_pulldown()))
    }

    pub fn floating(pin: u8) -> Result<Self> {
        let p = gpio()?.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self(p.into_input()))
    }
}

impl DigitalInput for RpiInput {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

pub struct RpiOutput(OutputPin);

impl RpiOutput {
    pub fn new_low(pin: u8) -> Result<Self> {
        let p = gpio()?.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self(p.into_output_low()))
    }
}

impl DigitalOutput for RpiOutput {
    fn set_high(&mut self) {
        self.0.set_high();
    }
    fn set_low(&mut self) {
        self.0.set_low();
    }
}

/// Software PWM on a GPIO line.
pub struct RpiPwm {
    pin: OutputPin,
    frequency_hz: f64,
}

impl RpiPwm {
    pub fn new(pin: u8) -> Result<Self> {
        let p = gpio()?.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            pin: p.into_output_low(),
            frequency_hz: 0.0,
        })
    }
}

impl PwmOutput for RpiPwm {
    fn configure(&mut self, frequency_hz: f64, duty_cycle: f64) -> std::result::Result<(), BoxError> {
        self.frequency_hz = frequency_hz;
        self.set_duty_cycle(duty_cycle)
    }

    fn set_duty_cycle(&mut self, duty_cycle: f64) -> std::result::Result<(), BoxError> {
        let duty = duty_cycle.clamp(0.0, 1.0);
        if duty == 0.0 || self.frequency_hz <= 0.0 {
            self.pin
                .clear_pwm()
                .map_err(|e| HwError::Gpio(e.to_string()))?;
            self.pin.set_low();
            return Ok(());
        }
        self.pin
            .set_pwm_frequency(self.frequency_hz, duty)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(())
    }
}

/// MCP3208 12-bit SPI ADC, one channel per instance.
pub struct Mcp3208 {
    spi: Spi,
    channel: u8,
}

impl Mcp3208 {
    pub fn new(channel: u8, clock_hz: u32) -> Result<Self> {
        if channel > 7 {
            return Err(HwError::Spi(format!("mcp3208 has no channel {channel}")));
        }
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi, channel })
    }
}

impl AnalogInput for Mcp3208 {
    fn read(&mut self) -> std::result::Result<u16, BoxError> {
        // start bit, single-ended, channel D2..D0
        let tx = [0x06 | (self.channel >> 2), (self.channel & 0x03) << 6, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let value = (u16::from(rx[1] & 0x0F) << 8) | u16::from(rx[2]);
        trace!(channel = self.channel, value, "mcp3208 sample");
        Ok(value)
    }
}
