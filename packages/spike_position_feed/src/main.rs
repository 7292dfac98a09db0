//! Spike: validate the position multiplexer end to end.
//!
//! This throwaway binary answers:
//! 1. Does a one-shot request start the provider and resolve from a fix?
//! 2. Does a watch keep receiving updates until cleared?
//! 3. Does a second one-shot short-circuit from the cached fix?
//!
//! Usage: cargo run -p spike_position_feed

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::info;

use position_mux::{
    GatewayError, GatewayEvents, Outcome, Position, PositionMux, ProviderGateway, StreamParams,
};

/// Fake provider: emits a drifting fix around Utrecht on the update
/// interval, and caches the latest one as the last known position.
struct SimulatedGateway {
    params: StreamParams,
    last_known: Arc<Mutex<Option<Position>>>,
    emitter: Option<JoinHandle<()>>,
}

impl SimulatedGateway {
    fn new(params: StreamParams) -> Self {
        Self {
            params,
            last_known: Arc::new(Mutex::new(None)),
            emitter: None,
        }
    }
}

impl ProviderGateway for SimulatedGateway {
    fn start_streaming(&mut self, events: GatewayEvents) -> Result<(), GatewayError> {
        let interval = self.params.min_interval;
        let last_known = self.last_known.clone();

        self.emitter = Some(tokio::spawn(async move {
            events.on_status_changed("simulated provider warming up");
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut rng = rand::rng();
                let mut pos = Position::new(
                    52.0907 + rng.random_range(-0.0005..0.0005),
                    5.1214 + rng.random_range(-0.0005..0.0005),
                );
                pos.accuracy = Some(rng.random_range(3.0..15.0));
                *last_known.lock().unwrap() = Some(pos.clone());
                events.on_position(pos);
            }
        }));
        Ok(())
    }

    fn stop_streaming(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            emitter.abort();
        }
    }

    fn last_known_position(&mut self) -> Option<Position> {
        self.last_known.lock().unwrap().clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("=== Spike: position multiplexer over a simulated provider ===");

    let gateway = SimulatedGateway::new(StreamParams::default());
    let mux = PositionMux::spawn(gateway);

    // --- Step 1: one-shot request, fresh provider ---
    info!("Step 1: one-shot position request (3s budget)...");
    let rx = mux.get_position(Duration::from_secs(3))?;
    match rx.await? {
        Outcome::Position(pos) => {
            info!(
                "one-shot resolved: {:.5}, {:.5} (accuracy {:?})",
                pos.latitude, pos.longitude, pos.accuracy
            )
        }
        Outcome::Error(err) => info!("one-shot failed: {} (code {})", err, err.code()),
    }

    // --- Step 2: watch, three updates, then clear ---
    info!("Step 2: watch subscription...");
    let mut updates = mux.watch("spike-watch")?;
    for _ in 0..3 {
        match updates.recv().await {
            Some(Outcome::Position(pos)) => {
                info!("watch update: {:.5}, {:.5}", pos.latitude, pos.longitude)
            }
            Some(Outcome::Error(err)) => info!("watch failure: {}", err),
            None => break,
        }
    }
    mux.clear_watch("spike-watch");
    info!("watch cleared, provider should stop");

    // --- Step 3: one-shot served from the cached fix ---
    info!("Step 3: one-shot against the cache...");
    let rx = mux.get_position(Duration::from_secs(3))?;
    match rx.await? {
        Outcome::Position(pos) => info!(
            "cached one-shot resolved: {:.5}, {:.5}",
            pos.latitude, pos.longitude
        ),
        Outcome::Error(err) => info!("cached one-shot failed: {}", err),
    }

    // --- Step 4: teardown ---
    info!("Step 4: destroying multiplexer...");
    mux.destroy();

    info!("=== Spike complete ===");
    Ok(())
}
