use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::position::Outcome;

/// Identity token for a pending one-shot request, issued at registration.
///
/// Two requests from the same caller get distinct tokens, so timeout
/// cancellation and resolution are never ambiguous.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub(crate) struct RequestId(pub(crate) u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Signal emitted by registry mutations: whether the active count just
/// crossed the zero boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Active count went 0 -> 1: the provider should start streaming.
    Started,
    /// Active count reached 0: the provider should stop streaming.
    Stopped,
    /// No boundary crossing.
    None,
}

/// The set of active watches and pending one-shot requests.
///
/// Sole source of truth for "is anything active". Pure storage: it emits
/// start/stop signals but never touches the provider gateway itself.
#[derive(Default)]
pub(crate) struct Registry {
    watches: HashMap<String, mpsc::UnboundedSender<Outcome>>,
    pending: HashMap<RequestId, oneshot::Sender<Outcome>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.watches.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// Insert or replace the watch under `key`.
    pub fn add_watch(&mut self, key: String, sink: mpsc::UnboundedSender<Outcome>) -> Transition {
        let was_empty = self.is_empty();
        self.watches.insert(key, sink);
        if was_empty {
            Transition::Started
        } else {
            Transition::None
        }
    }

    pub fn add_one_shot(&mut self, id: RequestId, sender: oneshot::Sender<Outcome>) -> Transition {
        let was_empty = self.is_empty();
        self.pending.insert(id, sender);
        if was_empty {
            Transition::Started
        } else {
            Transition::None
        }
    }

    /// Remove the watch under `key` if present. Idempotent.
    pub fn remove_watch(&mut self, key: &str) -> Transition {
        if self.watches.remove(key).is_none() {
            return Transition::None;
        }
        if self.is_empty() {
            Transition::Stopped
        } else {
            Transition::None
        }
    }

    /// Take ownership of a pending one-shot, removing it from the active
    /// set. Returns `None` if it was already claimed, which makes a racing
    /// timeout-fire and position-arrival resolve the request exactly once.
    pub fn claim_one_shot(&mut self, id: RequestId) -> Option<oneshot::Sender<Outcome>> {
        self.pending.remove(&id)
    }

    /// Drain every pending one-shot, in support of full fan-out.
    pub fn take_pending(&mut self) -> Vec<(RequestId, oneshot::Sender<Outcome>)> {
        self.pending.drain().collect()
    }

    pub fn watch_sinks(&self) -> impl Iterator<Item = &mpsc::UnboundedSender<Outcome>> {
        self.watches.values()
    }

    /// Drop everything without notifying anyone (teardown path).
    pub fn clear(&mut self) {
        self.watches.clear();
        self.pending.clear();
    }
}
