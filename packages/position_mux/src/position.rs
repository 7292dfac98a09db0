use serde::{Deserialize, Serialize};

use crate::error::PositionError;

/// A single fix from the underlying location provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters, if the provider reports one.
    pub accuracy: Option<f64>,
    /// Ground speed in meters per second.
    pub speed: Option<f64>,
    /// Heading in degrees clockwise from true north.
    pub bearing: Option<f64>,
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp_ms: i64,
}

impl Position {
    /// Create a position with the current timestamp and no optional fields.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            bearing: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// What a consumer receives: either a fix or a terminal failure.
///
/// A watch receives an unbounded sequence of outcomes; a one-shot request
/// receives exactly one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Position(Position),
    Error(PositionError),
}
