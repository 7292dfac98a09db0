//! Fan-out of provider outcomes to the active consumers.
//!
//! One-shots are claimed out of the registry before delivery, so each is
//! resolved at most once; watches are retained and keep receiving. Delivery
//! order across consumers is unspecified, but one-shots are notified before
//! watches.

use tracing::debug;

use crate::error::{ErrorKind, PositionError};
use crate::position::{Outcome, Position};
use crate::registry::{Registry, RequestId};

/// Deliver a fix to every pending one-shot and every watch.
///
/// Returns the ids of the one-shots this dispatch resolved, so the caller
/// can cancel their deadlines.
pub(crate) fn dispatch_success(registry: &mut Registry, position: &Position) -> Vec<RequestId> {
    let resolved = registry.take_pending();
    let mut ids = Vec::with_capacity(resolved.len());

    for (id, sender) in resolved {
        // Receiver may have been dropped; that is the consumer's choice.
        let _ = sender.send(Outcome::Position(position.clone()));
        ids.push(id);
    }

    for sink in registry.watch_sinks() {
        let _ = sink.send(Outcome::Position(position.clone()));
    }

    debug!(
        "dispatched position to {} one-shot(s), {} watch(es)",
        ids.len(),
        registry.active_count()
    );
    ids
}

/// Deliver a failure outcome to every pending one-shot and every watch.
pub(crate) fn dispatch_failure(
    registry: &mut Registry,
    kind: ErrorKind,
    message: &str,
) -> Vec<RequestId> {
    let error = PositionError::new(kind, message);
    let resolved = registry.take_pending();
    let mut ids = Vec::with_capacity(resolved.len());

    for (id, sender) in resolved {
        let _ = sender.send(Outcome::Error(error.clone()));
        ids.push(id);
    }

    for sink in registry.watch_sinks() {
        let _ = sink.send(Outcome::Error(error.clone()));
    }

    debug!(
        "dispatched {:?} to {} one-shot(s), {} watch(es)",
        kind,
        ids.len(),
        registry.active_count()
    );
    ids
}

/// Resolve a single one-shot with `Timeout`, if it is still pending.
/// Never a broadcast: watches are not subject to deadlines.
pub(crate) fn dispatch_timeout(registry: &mut Registry, id: RequestId) -> bool {
    match registry.claim_one_shot(id) {
        Some(sender) => {
            let _ = sender.send(Outcome::Error(PositionError::new(
                ErrorKind::Timeout,
                "position request timed out",
            )));
            true
        }
        None => false,
    }
}
