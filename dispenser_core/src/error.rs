use thiserror::Error;

/// Which echo edge the distance sensor was waiting for when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPhase {
    Rise,
    Fall,
}

impl core::fmt::Display for EchoPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Rise => "rise",
            Self::Fall => "fall",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispenserError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for echo {phase}")]
    SensorTimeout { phase: EchoPhase },
    #[error("real-time clock read failed: {0}")]
    ClockRead(String),
    #[error("time sync failed: {0}")]
    Sync(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing peripheral: {0}")]
    MissingPeripheral(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
