//! Maps `Box<dyn Error>` from trait boundaries to typed `DispenserError`.
//!
//! The traits in `dispenser_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `dispenser_hardware::HwError` downcasting.

use crate::error::{DispenserError, EchoPhase};

/// Map a trait-boundary error to a typed `DispenserError`.
///
/// `phase` is the echo edge being awaited when the error surfaced during a
/// measurement; other callers pass `None`. Known hardware error types are
/// downcast first, then string heuristics apply.
pub fn map_hw_error(
    e: &(dyn std::error::Error + 'static),
    phase: Option<EchoPhase>,
) -> DispenserError {
    #[cfg(feature = "hardware-errors")]
    {
        use dispenser_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::ClockNotSet | HwError::InvalidTime(_) => {
                    DispenserError::ClockRead(hw.to_string())
                }
                other => DispenserError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        DispenserError::SensorTimeout {
            phase: phase.unwrap_or(EchoPhase::Rise),
        }
    } else {
        DispenserError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Opaque(&'static str);
    impl core::fmt::Display for Opaque {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str(self.0)
        }
    }
    impl std::error::Error for Opaque {}

    #[test]
    fn string_fallback_detects_timeouts() {
        let e = Opaque("read Timeout on line 17");
        assert_eq!(
            map_hw_error(&e, Some(EchoPhase::Fall)),
            DispenserError::SensorTimeout {
                phase: EchoPhase::Fall
            }
        );
        assert_eq!(
            map_hw_error(&Opaque("bus stuck"), None),
            DispenserError::Hardware("bus stuck".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_downcast_precisely() {
        use dispenser_hardware::error::HwError;
        assert!(matches!(
            map_hw_error(&HwError::ClockNotSet, None),
            DispenserError::ClockRead(_)
        ));
        assert!(matches!(
            map_hw_error(&HwError::Spi("nak".into()), None),
            DispenserError::HardwareFault(_)
        ));
    }
}
