use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::mux::Command;
use crate::registry::RequestId;

/// Deadline scheduler for pending one-shot requests.
///
/// One sleep task per armed deadline; expiry posts a command back to the
/// multiplexer actor rather than touching shared state, so a fire can never
/// race a registry mutation. Created lazily on the first one-shot and torn
/// down when the registry empties.
pub(crate) struct TimeoutScheduler {
    commands: mpsc::UnboundedSender<Command>,
    timers: HashMap<RequestId, JoinHandle<()>>,
}

impl TimeoutScheduler {
    pub fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            commands,
            timers: HashMap::new(),
        }
    }

    /// Schedule a deadline for `id`. Independent of any other armed timer.
    pub fn arm(&mut self, id: RequestId, duration: Duration) {
        let commands = self.commands.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The actor may already be gone during teardown.
            let _ = commands.send(Command::DeadlineElapsed(id));
        });
        debug!("armed {:?} deadline for {}", duration, id);
        self.timers.insert(id, handle);
    }

    /// Best-effort cancellation. A timer that already fired has its expiry
    /// command ignored by the actor, since the request is no longer pending.
    pub fn cancel(&mut self, id: RequestId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
        }
    }

    /// Cancel all outstanding timers and release the scheduler.
    pub fn shutdown(mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}
