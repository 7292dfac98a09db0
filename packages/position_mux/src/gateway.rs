use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::mux::Command;
use crate::position::Position;

/// Update tuning handed to gateway implementations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamParams {
    /// Minimum interval between provider updates.
    pub min_interval: Duration,
    /// Minimum distance between provider updates, in meters.
    pub min_distance_m: f32,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1000),
            min_distance_m: 0.0,
        }
    }
}

/// The platform's location subsystem, as seen by the multiplexer.
///
/// Implementations wrap whatever actually produces fixes (a GPS daemon, a
/// system service, a simulation). Streaming is started and stopped only by
/// the multiplexer, and only on 0/1 active-consumer boundaries.
pub trait ProviderGateway: Send + 'static {
    /// Begin streaming updates, reporting them through `events`.
    fn start_streaming(&mut self, events: GatewayEvents) -> Result<(), GatewayError>;

    /// Stop streaming updates. Must be safe to call when not streaming.
    fn stop_streaming(&mut self);

    /// Best-effort cached fix, used to resolve one-shots without waiting
    /// for a fresh provider callback.
    fn last_known_position(&mut self) -> Option<Position>;
}

/// Inbound callback surface handed to the gateway on `start_streaming`.
///
/// Each callback posts a command to the multiplexer actor, so gateway
/// threads never touch the registry directly.
#[derive(Clone)]
pub struct GatewayEvents {
    commands: mpsc::UnboundedSender<Command>,
}

impl GatewayEvents {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// A new fix is available.
    pub fn on_position(&self, position: Position) {
        let _ = self.commands.send(Command::Position(position));
    }

    /// The underlying provider was switched off.
    pub fn on_provider_disabled(&self) {
        let _ = self.commands.send(Command::ProviderDisabled);
    }

    /// Informational only; never causes a state transition.
    pub fn on_status_changed(&self, info: &str) {
        let _ = self.commands.send(Command::StatusChanged(info.to_string()));
    }
}
