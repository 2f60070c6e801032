//! Listener registry with per-kind event filtering.

use std::collections::HashSet;

use tokio::sync::mpsc;

use crate::event::{DynetEvent, EventKind};

struct Listener {
    id: u64,
    /// Wildcard subscription: deliver every kind.
    all: bool,
    monitored: HashSet<EventKind>,
    tx: mpsc::UnboundedSender<DynetEvent>,
}

/// Owned by the engine; listeners are notified in registration order.
/// A listener whose receiver hung up is removed on the next matching
/// dispatch.
#[derive(Default)]
pub struct Broadcaster {
    listeners: Vec<Listener>,
}

impl Broadcaster {
    pub fn new() -> Broadcaster {
        Broadcaster::default()
    }

    /// Register with an empty monitored set; nothing is delivered
    /// until kinds (or the wildcard) are monitored.
    pub fn register(&mut self, id: u64, tx: mpsc::UnboundedSender<DynetEvent>) {
        self.listeners.push(Listener { id, all: false, monitored: HashSet::new(), tx });
    }

    pub fn monitor(&mut self, id: u64, kind: EventKind) {
        if let Some(listener) = self.listener_mut(id) {
            listener.monitored.insert(kind);
        }
    }

    pub fn unmonitor(&mut self, id: u64, kind: EventKind) {
        if let Some(listener) = self.listener_mut(id) {
            listener.monitored.remove(&kind);
        }
    }

    pub fn monitor_all(&mut self, id: u64) {
        if let Some(listener) = self.listener_mut(id) {
            listener.all = true;
        }
    }

    pub fn remove(&mut self, id: u64) {
        self.listeners.retain(|l| l.id != id);
    }

    pub fn dispatch(&mut self, event: &DynetEvent) {
        self.listeners.retain(|listener| {
            if listener.all || listener.monitored.contains(&event.kind) {
                listener.tx.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    fn listener_mut(&mut self, id: u64) -> Option<&mut Listener> {
        self.listeners.iter_mut().find(|l| l.id == id)
    }
}
