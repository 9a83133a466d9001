//! One-shot network time synchronization (SNTP client side).
//!
//! The exchange is a single best-effort attempt: resolve the server, send one
//! 48-byte request, take the first well-formed reply. There is no retry. When
//! no reply arrives within the response timeout a warning is logged once and
//! the session stays pending.

use std::net::SocketAddr;
use std::time::Instant;

use chrono::DateTime;
use dispenser_traits::{CivilTime, DatagramSocket, Resolver};

use crate::config::SyncCfg;
use crate::error::DispenserError;
use crate::events::{Event, EventSender};

pub const NTP_PACKET_LEN: usize = 48;
/// Seconds between 1900-01-01 and 1970-01-01.
pub const NTP_UNIX_DELTA: i64 = 2_208_988_800;
/// Offset of the transmit timestamp (seconds part) in a reply.
const TRANSMIT_OFFSET: usize = 40;

/// Client request: LI 0, version 3, mode 3; everything else zero.
pub fn encode_request() -> [u8; NTP_PACKET_LEN] {
    let mut buf = [0u8; NTP_PACKET_LEN];
    buf[0] = 0x1B;
    buf
}

/// Transmit timestamp seconds (since 1900) of a reply; `None` when short.
pub fn transmit_seconds(datagram: &[u8]) -> Option<u32> {
    if datagram.len() < NTP_PACKET_LEN {
        return None;
    }
    let bytes: [u8; 4] = datagram[TRANSMIT_OFFSET..TRANSMIT_OFFSET + 4].try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Local civil time for NTP `seconds` at a fixed zone offset.
///
/// Values before the Unix epoch are read as the next NTP era (2036 onwards).
pub fn ntp_to_civil(seconds: u32, zone_offset_s: i32) -> Option<CivilTime> {
    let mut unix = i64::from(seconds) - NTP_UNIX_DELTA;
    if unix < 0 {
        unix += 1 << 32;
    }
    let local = unix + i64::from(zone_offset_s);
    let dt = DateTime::from_timestamp(local, 0)?;
    Some(CivilTime::from(dt.naive_utc()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    NotStarted,
    Resolving,
    AwaitingReply,
    Done,
    Failed,
}

pub struct TimeSync {
    cfg: SyncCfg,
    phase: SyncPhase,
    server: Option<SocketAddr>,
    pending: bool,
    sent_at: Option<Instant>,
    timeout_reported: bool,
}

impl TimeSync {
    pub fn new(cfg: SyncCfg) -> Self {
        Self {
            cfg,
            phase: SyncPhase::NotStarted,
            server: None,
            pending: false,
            sent_at: None,
            timeout_reported: false,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// A request is in flight and unanswered.
    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn server(&self) -> Option<SocketAddr> {
        self.server
    }

    pub fn cfg(&self) -> &SyncCfg {
        &self.cfg
    }

    /// Begin resolving the server. Only the first call has any effect.
    pub fn start(&mut self, resolver: &mut dyn Resolver, events: &EventSender) {
        if self.phase != SyncPhase::NotStarted {
            return;
        }
        self.phase = SyncPhase::Resolving;
        tracing::debug!(server = %self.cfg.server, port = self.cfg.port, "resolving time server");
        let tx = events.clone();
        resolver.resolve(
            &self.cfg.server,
            self.cfg.port,
            Box::new(move |r| match r {
                Ok(addr) => tx.send(Event::ServerResolved(addr)),
                Err(e) => tx.send(Event::ResolveFailed(e.to_string())),
            }),
        );
    }

    /// Send the single request to the resolved server.
    pub fn on_resolved(
        &mut self,
        addr: SocketAddr,
        socket: &mut dyn DatagramSocket,
        now: Instant,
    ) -> Result<(), DispenserError> {
        if self.phase != SyncPhase::Resolving {
            tracing::debug!(%addr, "ignoring resolution outside the resolving phase");
            return Ok(());
        }
        self.server = Some(addr);
        if let Err(e) = socket.send_to(&encode_request(), addr) {
            self.phase = SyncPhase::Failed;
            return Err(DispenserError::Sync(format!("send to {addr}: {e}")));
        }
        self.pending = true;
        self.sent_at = Some(now);
        self.phase = SyncPhase::AwaitingReply;
        tracing::debug!(%addr, "time request sent");
        Ok(())
    }

    pub fn on_resolve_failed(&mut self, reason: &str) -> DispenserError {
        self.phase = SyncPhase::Failed;
        DispenserError::Sync(format!("cannot resolve {}: {reason}", self.cfg.server))
    }

    /// Drain every queued datagram. Returns the local time carried by the
    /// first acceptable reply; anything else is discarded.
    pub fn poll(
        &mut self,
        socket: &mut dyn DatagramSocket,
        now: Instant,
    ) -> Result<Option<CivilTime>, DispenserError> {
        let mut buf = [0u8; 2 * NTP_PACKET_LEN];
        let mut got = None;
        while let Some(n) = socket
            .try_recv(&mut buf)
            .map_err(|e| DispenserError::Sync(format!("receive: {e}")))?
        {
            let datagram = &buf[..n.min(buf.len())];
            if self.phase != SyncPhase::AwaitingReply || got.is_some() {
                tracing::debug!(len = n, "discarding unexpected datagram");
                continue;
            }
            let Some(secs) = transmit_seconds(datagram) else {
                tracing::debug!(len = n, "discarding short datagram");
                continue;
            };
            match ntp_to_civil(secs, self.cfg.zone_offset_s) {
                Some(t) => {
                    tracing::debug!(ntp_seconds = secs, local = %t, "time reply");
                    self.pending = false;
                    self.phase = SyncPhase::Done;
                    got = Some(t);
                }
                None => tracing::debug!(ntp_seconds = secs, "discarding unrepresentable time"),
            }
        }

        if self.pending
            && !self.timeout_reported
            && let Some(sent) = self.sent_at
            && now.saturating_duration_since(sent) >= self.cfg.response_timeout
        {
            self.timeout_reported = true;
            tracing::warn!(
                server = %self.cfg.server,
                waited_ms = self.cfg.response_timeout.as_millis() as u64,
                "no reply from time server; clock stays unsynchronised"
            );
        }
        Ok(got)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let req = encode_request();
        assert_eq!(req.len(), 48);
        assert_eq!(req[0], 0x1B);
        assert!(req[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn short_datagrams_have_no_timestamp() {
        assert_eq!(transmit_seconds(&[0u8; 47]), None);
        let mut reply = [0u8; 48];
        reply[40..44].copy_from_slice(&[235, 99, 54, 152]);
        assert_eq!(transmit_seconds(&reply), Some(3_949_147_800));
    }

    #[test]
    fn reference_timestamp_is_friday_afternoon() {
        // 0xEB633698 -> 2025-02-21 17:30:00 UTC -> 14:30:00 at UTC-3
        let t = ntp_to_civil(3_949_147_800, -10_800).unwrap();
        assert_eq!(
            t,
            CivilTime {
                year: 2025,
                month: 2,
                day: 21,
                weekday: 5,
                hour: 14,
                minute: 30,
                second: 0,
            }
        );
    }

    #[test]
    fn offset_applies_to_the_unix_epoch() {
        let t = ntp_to_civil((NTP_UNIX_DELTA + 10_800) as u32, -10_800).unwrap();
        assert_eq!((t.year, t.month, t.day, t.weekday), (1970, 1, 1, 4));
        assert_eq!((t.hour, t.minute, t.second), (0, 0, 0));
    }

    #[test]
    fn next_era_rolls_forward() {
        // era 1 second 0 is 2036-02-07 06:28:16 UTC
        let t = ntp_to_civil(0, 0).unwrap();
        assert_eq!((t.year, t.month, t.day), (2036, 2, 7));
        assert_eq!((t.hour, t.minute, t.second), (6, 28, 16));
    }
}
