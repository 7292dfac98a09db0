//! Position Mux - location request multiplexing library
//!
//! This crate fans a single location-provider stream out to many independent
//! consumers: long-lived watch subscriptions and timeout-bounded one-shot
//! requests. The provider runs only while at least one consumer is active,
//! and every one-shot resolves exactly once (position, failure, or timeout).
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use position_mux::{Outcome, PositionMux, ProviderGateway};
//!
//! async fn locate(gateway: impl ProviderGateway) {
//!     let mux = PositionMux::spawn(gateway);
//!
//!     // One answer, or Timeout after two seconds.
//!     let rx = mux.get_position(Duration::from_secs(2)).unwrap();
//!     match rx.await {
//!         Ok(Outcome::Position(pos)) => println!("at {}, {}", pos.latitude, pos.longitude),
//!         Ok(Outcome::Error(err)) => println!("failed: {} (code {})", err, err.code()),
//!         Err(_) => println!("multiplexer destroyed"),
//!     }
//!
//!     // Continuous updates until cleared.
//!     let mut updates = mux.watch("w1").unwrap();
//!     while let Some(outcome) = updates.recv().await {
//!         println!("update: {:?}", outcome);
//!     }
//!     mux.clear_watch("w1");
//! }
//! ```

mod dispatch;
mod error;
mod gateway;
mod mux;
mod position;
mod registry;
mod timeout;

pub use error::{ErrorKind, GatewayError, PositionError, RegisterError};
pub use gateway::{GatewayEvents, ProviderGateway, StreamParams};
pub use mux::PositionMux;
pub use position::{Outcome, Position};
