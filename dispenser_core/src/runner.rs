//! The cooperative control loop around `Dispenser::tick`.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::automaton::Dispenser;
use crate::error::Result;
use crate::status::TickReport;

/// Start the dispenser and tick it until `shutdown` is set or `max_ticks`
/// ticks have run, then park the actuators. Returns the number of ticks.
///
/// A failed tick is logged and the loop carries on; only startup errors are
/// returned.
pub fn run(
    dispenser: &mut Dispenser,
    shutdown: &AtomicBool,
    max_ticks: Option<u64>,
    mut on_report: impl FnMut(&TickReport),
) -> Result<u64> {
    dispenser.start()?;
    let clock = dispenser.clock().clone();
    let mut ticks: u64 = 0;
    while !shutdown.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| ticks < max) {
        match dispenser.tick() {
            Ok(report) => {
                on_report(&report);
                clock.sleep(report.dwell);
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), state = %dispenser.state(), "tick failed");
                clock.sleep(dispenser.dwell_for(dispenser.state()));
            }
        }
        ticks += 1;
    }
    if let Err(e) = dispenser.shutdown() {
        tracing::warn!(error = %format!("{e:#}"), "shutdown incomplete");
    }
    tracing::info!(ticks, "control loop stopped");
    Ok(ticks)
}
