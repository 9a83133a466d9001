//! Software real-time clock: calendar time derived from a monotonic clock,
//! with a single one-shot alarm slot.
//!
//! The alarm is evaluated by `poll_alarm`, either from a watcher thread
//! (`spawn_alarm_watcher`) or directly by tests. Every whole second after the
//! previous poll is checked, so a late poll never skips the matching second.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use dispenser_traits::{AlarmCallback, AlarmMatch, BoxError, CivilTime, Clock, RealTimeClock};
use tracing::{debug, info, trace};

use crate::error::{HwError, Result};

/// Upper bound on seconds scanned by one `poll_alarm` call.
const MAX_CATCH_UP_SECS: i64 = 24 * 60 * 60;

struct Armed {
    at: AlarmMatch,
    on_fire: AlarmCallback,
}

#[derive(Default)]
struct RtcInner {
    base: Option<(NaiveDateTime, Instant)>,
    alarm: Option<Armed>,
    last_checked: Option<NaiveDateTime>,
    failing_reads: u32,
}

#[derive(Clone)]
pub struct SoftRtc {
    inner: Arc<Mutex<RtcInner>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SoftRtc {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RtcInner::default())),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RtcInner>> {
        self.inner
            .lock()
            .map_err(|_| HwError::Io(std::io::Error::other("rtc state poisoned")))
    }

    fn current(&self, inner: &RtcInner) -> Option<NaiveDateTime> {
        let (base, at) = inner.base?;
        let elapsed = self.clock.now().saturating_duration_since(at);
        let delta = TimeDelta::from_std(elapsed).ok()?;
        base.checked_add_signed(delta)
    }

    /// Make the next `n` reads fail, as a flaky peripheral would.
    pub fn inject_read_failures(&self, n: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_reads = n;
        }
    }

    pub fn alarm_armed(&self) -> bool {
        self.inner.lock().map(|i| i.alarm.is_some()).unwrap_or(false)
    }

    /// Fire the alarm if a matching second has passed since the last poll.
    /// Returns true when the callback ran.
    pub fn poll_alarm(&self) -> bool {
        let fired = {
            let Ok(mut inner) = self.inner.lock() else {
                return false;
            };
            let Some(now) = self.current(&inner) else {
                return false;
            };
            let from = inner.last_checked.unwrap_or(now);
            inner.last_checked = Some(now);
            let Some(armed) = inner.alarm.as_ref() else {
                return false;
            };
            // whole-second labels in (from, now]
            let from_s = from.and_utc().timestamp();
            let now_s = now.and_utc().timestamp();
            let first = (from_s + 1).max(now_s - MAX_CATCH_UP_SECS);
            let hit = (first..=now_s).any(|s| {
                DateTime::from_timestamp(s, 0)
                    .is_some_and(|t| armed.at.matches(&CivilTime::from(t.naive_utc())))
            });
            if hit {
                // one-shot: disarm before the callback runs
                inner.alarm.take()
            } else {
                None
            }
        };
        match fired {
            Some(mut armed) => {
                info!("rtc alarm fired");
                (armed.on_fire)();
                true
            }
            None => false,
        }
    }

    /// Poll the alarm from a background thread until `shutdown` is set.
    pub fn spawn_alarm_watcher(
        &self,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let rtc = self.clone();
        std::thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                rtc.poll_alarm();
                rtc.clock.sleep(interval);
            }
            trace!("rtc alarm watcher exiting");
        })
    }
}

impl RealTimeClock for SoftRtc {
    fn datetime(&mut self) -> std::result::Result<CivilTime, BoxError> {
        let mut inner = self.lock()?;
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(Box::new(HwError::Io(std::io::Error::other(
                "rtc read failed",
            ))));
        }
        let now = self.current(&inner).ok_or(HwError::ClockNotSet)?;
        Ok(CivilTime::from(now))
    }

    fn set_datetime(&mut self, t: CivilTime) -> std::result::Result<(), BoxError> {
        let naive = t
            .to_naive()
            .ok_or_else(|| HwError::InvalidTime(format!("{t}")))?;
        let mut inner = self.lock()?;
        inner.base = Some((naive, self.clock.now()));
        inner.last_checked = Some(naive);
        debug!(time = %t, "rtc set");
        Ok(())
    }

    fn reinit(&mut self) -> std::result::Result<(), BoxError> {
        // Nothing to restart in software; the calendar base survives.
        debug!("rtc reinit");
        Ok(())
    }

    fn set_alarm(
        &mut self,
        at: AlarmMatch,
        on_fire: AlarmCallback,
    ) -> std::result::Result<(), BoxError> {
        let mut inner = self.lock()?;
        let now = self.current(&inner);
        inner.last_checked = now;
        inner.alarm = Some(Armed { at, on_fire });
        debug!(?at, "rtc alarm armed");
        Ok(())
    }

    fn disable_alarm(&mut self) -> std::result::Result<(), BoxError> {
        self.lock()?.alarm = None;
        Ok(())
    }
}
