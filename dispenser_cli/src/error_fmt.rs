//! Human-readable error descriptions, exit codes and JSON error objects.

use dispenser_core::error::{BuildError, DispenserError, EchoPhase};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPeripheral(name) => format!(
                "What happened: The {name} was not provided to the controller.\nLikely causes: The peripheral failed to initialize or was not wired into the builder.\nHow to fix: Check the [pins] section and the startup log for the failing device."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `dispenser health`."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DispenserError>() {
        return match de {
            DispenserError::SensorTimeout {
                phase: EchoPhase::Rise,
            } => "What happened: The distance sensor never answered (echo did not rise).\nLikely causes: TRIG/ECHO pins swapped or unwired, no 5V supply, or nothing within range.\nHow to fix: Check [pins].trigger and [pins].echo, the sensor supply, and distance.timeout_us.".to_string(),
            DispenserError::SensorTimeout {
                phase: EchoPhase::Fall,
            } => "What happened: The distance sensor echo stayed high.\nLikely causes: A faulty sensor or a missing level shifter on ECHO.\nHow to fix: Check the ECHO wiring and raise distance.timeout_us if targets are far away.".to_string(),
            DispenserError::Sync(msg) => format!(
                "What happened: Time synchronisation failed ({msg}).\nLikely causes: No network, DNS failure, or UDP port 123 blocked.\nHow to fix: Check connectivity and [time_sync].server, or raise time_sync.response_timeout_ms."
            ),
            DispenserError::Config(msg) => format!(
                "What happened: The configuration could not be loaded.\nLikely causes: {msg}\nHow to fix: Edit the config file, then rerun `dispenser health`."
            ),
            DispenserError::ClockRead(msg) => format!(
                "What happened: The real-time clock could not be read ({msg}).\nLikely causes: The clock was never set; time sync has not completed.\nHow to fix: Run `dispenser sync` to check the time server."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("open ") && lower.contains("pin") {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access /dev/gpiomem.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes: sensor timeout 3, sync failure 4, config 5, other 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(de) = err.downcast_ref::<DispenserError>() {
        return match de {
            DispenserError::SensorTimeout { .. } => 3,
            DispenserError::Sync(_) => 4,
            DispenserError::Config(_) => 5,
            _ => 1,
        };
    }
    if matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ) {
        return 5;
    }
    1
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<DispenserError>() {
        Some(DispenserError::SensorTimeout { .. }) => "SensorTimeout",
        Some(DispenserError::Sync(_)) => "SyncFailed",
        Some(DispenserError::Config(_)) => "Config",
        Some(DispenserError::ClockRead(_)) => "ClockRead",
        Some(DispenserError::Hardware(_) | DispenserError::HardwareFault(_)) => "Hardware",
        Some(DispenserError::State(_)) => "State",
        None if err.downcast_ref::<BuildError>().is_some() => "Build",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(DispenserError::SensorTimeout { phase }) = err.downcast_ref::<DispenserError>() {
        obj["details"] = json!({ "phase": phase.to_string() });
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let timeout = eyre::Report::new(DispenserError::SensorTimeout {
            phase: EchoPhase::Rise,
        });
        assert_eq!(exit_code_for_error(&timeout), 3);
        let sync = eyre::Report::new(DispenserError::Sync("no reply".into()));
        assert_eq!(exit_code_for_error(&sync), 4);
        let cfg = eyre::Report::new(BuildError::InvalidConfig("x"));
        assert_eq!(exit_code_for_error(&cfg), 5);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        use eyre::WrapErr;
        let r: eyre::Result<()> = Err(eyre::Report::new(DispenserError::Sync("x".into())));
        let err = r.wrap_err("sync command").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).starts_with("What happened: Time synchronisation failed"));
    }

    #[test]
    fn json_error_carries_phase() {
        let err = eyre::Report::new(DispenserError::SensorTimeout {
            phase: EchoPhase::Fall,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "SensorTimeout");
        assert_eq!(v["exit_code"], 3);
        assert_eq!(v["details"]["phase"], "fall");
    }
}
