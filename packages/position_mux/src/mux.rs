use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dispatch;
use crate::error::{ErrorKind, GatewayError, PositionError, RegisterError};
use crate::gateway::{GatewayEvents, ProviderGateway};
use crate::position::{Outcome, Position};
use crate::registry::{Registry, RequestId, Transition};
use crate::timeout::TimeoutScheduler;

/// Messages processed by the multiplexer actor. Registrations, gateway
/// callbacks, and timer expiries all arrive on the same channel, which is
/// what serializes every registry mutation.
pub(crate) enum Command {
    AddWatch {
        key: String,
        sink: mpsc::UnboundedSender<Outcome>,
    },
    AddOneShot {
        sender: oneshot::Sender<Outcome>,
        timeout: Duration,
    },
    ClearWatch {
        key: String,
    },
    Position(Position),
    ProviderDisabled,
    StatusChanged(String),
    DeadlineElapsed(RequestId),
    Destroy,
}

/// Multiplexes watches and one-shot requests onto one provider stream.
///
/// Clonable handle to the actor task; the actor exclusively owns the
/// registry, the timeout scheduler, and the gateway's streaming state.
/// The actor lives until [`destroy`](Self::destroy) is called.
#[derive(Clone)]
pub struct PositionMux {
    commands: mpsc::UnboundedSender<Command>,
}

impl PositionMux {
    /// Spawn the multiplexer actor around `gateway`.
    pub fn spawn(gateway: impl ProviderGateway) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let actor = MuxActor {
            gateway: Box::new(gateway),
            registry: Registry::new(),
            scheduler: None,
            streaming: false,
            next_id: 1,
            commands: commands.clone(),
        };

        tokio::spawn(actor.run(rx));

        Self { commands }
    }

    /// Register (or replace) a persistent watch under `key`. The sink keeps
    /// receiving outcomes until `clear_watch` is called with the same key.
    pub fn add_watch(
        &self,
        key: impl Into<String>,
        sink: mpsc::UnboundedSender<Outcome>,
    ) -> Result<(), RegisterError> {
        self.commands
            .send(Command::AddWatch {
                key: key.into(),
                sink,
            })
            .map_err(|_| RegisterError::Terminated)
    }

    /// Convenience wrapper around [`add_watch`](Self::add_watch) that
    /// allocates the channel for the caller.
    pub fn watch(
        &self,
        key: impl Into<String>,
    ) -> Result<mpsc::UnboundedReceiver<Outcome>, RegisterError> {
        let (sink, rx) = mpsc::unbounded_channel();
        self.add_watch(key, sink)?;
        Ok(rx)
    }

    /// Register a one-shot request. `sender` receives exactly one outcome:
    /// a position, a failure, or `Timeout` after `timeout` elapses.
    pub fn add_one_shot(
        &self,
        sender: oneshot::Sender<Outcome>,
        timeout: Duration,
    ) -> Result<(), RegisterError> {
        self.commands
            .send(Command::AddOneShot { sender, timeout })
            .map_err(|_| RegisterError::Terminated)
    }

    /// Convenience wrapper around [`add_one_shot`](Self::add_one_shot).
    pub fn get_position(
        &self,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Outcome>, RegisterError> {
        let (sender, rx) = oneshot::channel();
        self.add_one_shot(sender, timeout)?;
        Ok(rx)
    }

    /// Remove the watch under `key`. A no-op for unknown keys.
    pub fn clear_watch(&self, key: impl Into<String>) {
        let _ = self.commands.send(Command::ClearWatch { key: key.into() });
    }

    /// Unconditional teardown: stop the provider, drop all consumers
    /// without notifying them. Process-teardown path.
    pub fn destroy(&self) {
        let _ = self.commands.send(Command::Destroy);
    }
}

/// IDLE (no consumers, provider stopped) / ACTIVE (>=1 consumer, provider
/// streaming). The `streaming` flag plus registry emptiness encode the
/// state; every command handler re-establishes the invariant before
/// returning.
struct MuxActor {
    gateway: Box<dyn ProviderGateway>,
    registry: Registry,
    scheduler: Option<TimeoutScheduler>,
    streaming: bool,
    next_id: u64,
    commands: mpsc::UnboundedSender<Command>,
}

impl MuxActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("position multiplexer started");

        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::AddWatch { key, sink } => self.handle_add_watch(key, sink),
                Command::AddOneShot { sender, timeout } => {
                    self.handle_add_one_shot(sender, timeout)
                }
                Command::ClearWatch { key } => self.handle_clear_watch(&key),
                Command::Position(position) => self.handle_position(position),
                Command::ProviderDisabled => self.handle_provider_disabled(),
                Command::StatusChanged(info) => {
                    debug!("provider status changed: {}", info);
                }
                Command::DeadlineElapsed(id) => self.handle_deadline(id),
                Command::Destroy => break,
            }
        }

        self.teardown();
        debug!("position multiplexer shut down");
    }

    fn handle_add_watch(&mut self, key: String, sink: mpsc::UnboundedSender<Outcome>) {
        debug!("adding watch {}", key);
        let new_consumer = sink.clone();
        if self.registry.add_watch(key.clone(), sink) == Transition::Started {
            if let Err(err) = self.start_streaming() {
                warn!("provider failed to start for watch {}: {}", key, err);
                // Only the newly added consumer hears about it; the watch is
                // dropped and the state reverts to idle.
                self.registry.remove_watch(&key);
                let _ = new_consumer.send(Outcome::Error(PositionError::new(
                    ErrorKind::PositionUnavailable,
                    err.to_string(),
                )));
            }
        }
    }

    fn handle_add_one_shot(&mut self, sender: oneshot::Sender<Outcome>, timeout: Duration) {
        // Best-effort short-circuit: a cached fix resolves the request
        // before it is ever registered, so it neither starts the provider
        // nor arms a deadline.
        if let Some(position) = self.gateway.last_known_position() {
            debug!("one-shot resolved from last known position");
            let _ = sender.send(Outcome::Position(position));
            return;
        }

        let id = RequestId(self.next_id);
        self.next_id += 1;

        if self.registry.add_one_shot(id, sender) == Transition::Started {
            if let Err(err) = self.start_streaming() {
                warn!("provider failed to start for {}: {}", id, err);
                if let Some(sender) = self.registry.claim_one_shot(id) {
                    let _ = sender.send(Outcome::Error(PositionError::new(
                        ErrorKind::PositionUnavailable,
                        err.to_string(),
                    )));
                }
                return;
            }
        }

        self.scheduler
            .get_or_insert_with(|| TimeoutScheduler::new(self.commands.clone()))
            .arm(id, timeout);
    }

    fn handle_clear_watch(&mut self, key: &str) {
        debug!("clearing watch {}", key);
        if self.registry.remove_watch(key) == Transition::Stopped {
            self.enter_idle();
        }
    }

    fn handle_position(&mut self, position: Position) {
        let resolved = dispatch::dispatch_success(&mut self.registry, &position);
        self.cancel_deadlines(&resolved);
        self.check_idle();
    }

    fn handle_provider_disabled(&mut self) {
        info!("location provider has been disabled");
        let resolved = dispatch::dispatch_failure(
            &mut self.registry,
            ErrorKind::PositionUnavailable,
            "location provider has been disabled",
        );
        self.cancel_deadlines(&resolved);
        self.check_idle();
    }

    fn handle_deadline(&mut self, id: RequestId) {
        if dispatch::dispatch_timeout(&mut self.registry, id) {
            debug!("{} timed out", id);
        }
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.cancel(id);
        }
        self.check_idle();
    }

    fn cancel_deadlines(&mut self, resolved: &[RequestId]) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            for id in resolved {
                scheduler.cancel(*id);
            }
        }
    }

    fn start_streaming(&mut self) -> Result<(), GatewayError> {
        self.gateway
            .start_streaming(GatewayEvents::new(self.commands.clone()))?;
        self.streaming = true;
        info!("provider streaming started");
        Ok(())
    }

    fn check_idle(&mut self) {
        if self.registry.is_empty() {
            self.enter_idle();
        }
    }

    fn enter_idle(&mut self) {
        if self.streaming {
            self.gateway.stop_streaming();
            self.streaming = false;
            info!("provider streaming stopped");
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
    }

    fn teardown(&mut self) {
        self.registry.clear();
        self.enter_idle();
    }
}
