//! Error taxonomy: consumer-facing outcomes, registration failures, and
//! gateway failures.

use serde::{Deserialize, Serialize};

/// Terminal failure kinds delivered to consumers as outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl ErrorKind {
    /// Numeric code used on the wire, matching the W3C geolocation codes.
    pub fn code(&self) -> u16 {
        match self {
            Self::PermissionDenied => 1,
            Self::PositionUnavailable => 2,
            Self::Timeout => 3,
        }
    }
}

/// A failure outcome delivered to a consumer.
///
/// These are outcomes, not faults: dispatching one always succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct PositionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PositionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

/// Synchronous registration failure, distinct from consumer outcomes:
/// it means no request was registered at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegisterError {
    #[error("multiplexer has been destroyed")]
    Terminated,
}

/// Failures reported by a provider gateway when asked to start streaming.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("no location provider available")]
    NoProvider,

    #[error("provider rejected streaming request: {0}")]
    StartFailed(String),
}
