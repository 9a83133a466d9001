//! Asynchronous notifications (resolver and alarm callbacks) handed to the
//! control loop through a channel. The loop consumes at most one per tick.

use std::net::SocketAddr;

use crossbeam_channel as xch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ServerResolved(SocketAddr),
    ResolveFailed(String),
    AlarmFired,
}

pub struct EventQueue {
    tx: xch::Sender<Event>,
    rx: xch::Receiver<Event>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = xch::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender(self.tx.clone())
    }

    pub fn try_next(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Cloneable producer side; safe to move into callbacks on other threads.
#[derive(Clone)]
pub struct EventSender(xch::Sender<Event>);

impl EventSender {
    pub fn send(&self, ev: Event) {
        if self.0.send(ev).is_err() {
            tracing::debug!("event queue closed; dropping event");
        }
    }
}
