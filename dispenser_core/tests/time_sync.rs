mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{FRIDAY_1430, rig_with, server};
use dispenser_core::events::EventQueue;
use dispenser_core::{Notice, SyncCfg, SyncPhase, SystemState, TimeSync};
use dispenser_hardware::sim::{SimNtpServer, StaticResolver};
use dispenser_traits::{ResolveCallback, Resolver};

/// Holds the lookup callback until the test completes it.
#[derive(Clone, Default)]
struct DeferredResolver(Arc<Mutex<Option<ResolveCallback>>>);

impl DeferredResolver {
    fn complete(&self, addr: SocketAddr) {
        let cb = self.0.lock().unwrap().take().expect("lookup requested");
        cb(Ok(addr));
    }
}

impl Resolver for DeferredResolver {
    fn resolve(&mut self, _host: &str, _port: u16, on_done: ResolveCallback) {
        *self.0.lock().unwrap() = Some(on_done);
    }
}

#[test]
fn silent_server_never_retried() {
    let mut r = rig_with(
        SimNtpServer::fixed(FRIDAY_1430).silent(),
        StaticResolver::new(server()),
    )
    .started();
    r.tick();
    assert_eq!(r.dispenser.sync_phase(), SyncPhase::AwaitingReply);
    r.clock.advance(Duration::from_secs(6));
    for _ in 0..10 {
        let report = r.tick();
        assert_eq!(report.state(), SystemState::Initial);
        assert!(report.notices.is_empty());
    }
    assert_eq!(r.ntp.requests(), 1);
    assert_eq!(r.dispenser.sync_phase(), SyncPhase::AwaitingReply);
}

#[test]
fn short_datagram_is_discarded_and_reply_still_accepted() {
    let mut r = rig_with(
        SimNtpServer::fixed(FRIDAY_1430).silent(),
        StaticResolver::new(server()),
    )
    .started();
    r.tick();
    r.ntp.inject(vec![0x1C; 20]);
    assert_eq!(r.tick().state(), SystemState::Initial);
    assert_eq!(r.dispenser.sync_phase(), SyncPhase::AwaitingReply);

    r.ntp.inject(SimNtpServer::reply(FRIDAY_1430));
    let report = r.tick();
    assert!(report.visited(SystemState::ShowTime));
    assert_eq!(report.state(), SystemState::AskAlarm);
}

#[test]
fn late_reply_after_commit_is_ignored() {
    let mut r = rig_with(SimNtpServer::fixed(FRIDAY_1430), StaticResolver::new(server())).started();
    r.tick();
    r.ntp.inject(SimNtpServer::reply(FRIDAY_1430 + 3_600));
    let report = r.tick();
    assert!(
        !report
            .notices
            .iter()
            .any(|n| matches!(n, Notice::ClockSynced { .. }))
    );
    assert_eq!(report.state(), SystemState::AskAlarm);
}

#[test]
fn resolve_failure_leaves_automaton_waiting() {
    let mut r = rig_with(SimNtpServer::fixed(FRIDAY_1430), StaticResolver::unreachable()).started();
    let report = r.tick();
    assert_eq!(report.state(), SystemState::Initial);
    assert_eq!(r.dispenser.sync_phase(), SyncPhase::Failed);
    assert_eq!(r.ntp.requests(), 0);
}

#[test]
fn tick_before_start_is_rejected() {
    let mut r = rig_with(SimNtpServer::fixed(FRIDAY_1430), StaticResolver::new(server()));
    let err = r.dispenser.tick().unwrap_err();
    assert!(err.to_string().contains("tick before start"), "{err}");
}

#[test]
fn repeated_resolution_sends_one_request() {
    let mut ntp = SimNtpServer::fixed(FRIDAY_1430);
    let queue = EventQueue::new();
    let mut sync = TimeSync::new(SyncCfg::default());
    sync.start(&mut StaticResolver::new(server()), &queue.sender());
    assert_eq!(sync.phase(), SyncPhase::Resolving);
    assert!(!sync.pending());

    let now = Instant::now();
    sync.on_resolved(server(), &mut ntp, now).unwrap();
    assert!(sync.pending());
    sync.on_resolved(server(), &mut ntp, now).unwrap();
    assert_eq!(ntp.requests(), 1);
    assert_eq!(sync.phase(), SyncPhase::AwaitingReply);

    let t = sync.poll(&mut ntp, now).unwrap().expect("reply accepted");
    assert_eq!((t.hour, t.minute, t.second), (14, 30, 0));
    assert!(!sync.pending());

    sync.on_resolved(server(), &mut ntp, now).unwrap();
    assert_eq!(ntp.requests(), 1);
    assert_eq!(sync.phase(), SyncPhase::Done);
}

#[test]
fn reply_before_resolution_is_discarded() {
    let resolver = DeferredResolver::default();
    let mut r = rig_with(SimNtpServer::fixed(FRIDAY_1430), resolver.clone()).started();
    assert_eq!(r.dispenser.sync_phase(), SyncPhase::Resolving);

    r.ntp.inject(SimNtpServer::reply(FRIDAY_1430 + 3_600));
    let report = r.tick();
    assert_eq!(report.state(), SystemState::Initial);
    assert!(report.notices.is_empty());
    assert_eq!(r.dispenser.sync_phase(), SyncPhase::Resolving);

    resolver.complete(server());
    let report = r.tick();
    assert_eq!(r.ntp.requests(), 1);
    assert_eq!(report.state(), SystemState::AskAlarm);
    assert!(report.notices.iter().any(|n| matches!(
        n,
        Notice::ClockSynced { time, .. } if time.hour == 14 && time.minute == 30
    )));
}
