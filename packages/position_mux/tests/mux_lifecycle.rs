//! Lifecycle tests for the multiplexer actor, driven by a scripted gateway.
//!
//! All tests run on a paused clock, so deadline timing is deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_test::assert_ok;

use position_mux::{
    ErrorKind, GatewayError, GatewayEvents, Outcome, Position, PositionMux, ProviderGateway,
};

#[derive(Default)]
struct GatewayLog {
    starts: usize,
    stops: usize,
    events: Option<GatewayEvents>,
}

/// Scripted provider gateway: records start/stop calls and exposes the
/// callback surface handed to it, so tests can inject provider events.
#[derive(Clone, Default)]
struct FakeGateway {
    log: Arc<Mutex<GatewayLog>>,
    last_known: Option<Position>,
    fail_start: bool,
}

impl FakeGateway {
    fn with_last_known(position: Position) -> Self {
        Self {
            last_known: Some(position),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    fn starts(&self) -> usize {
        self.log.lock().unwrap().starts
    }

    fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    fn events(&self) -> GatewayEvents {
        self.log
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("gateway was never started")
    }
}

impl ProviderGateway for FakeGateway {
    fn start_streaming(&mut self, events: GatewayEvents) -> Result<(), GatewayError> {
        let mut log = self.log.lock().unwrap();
        log.starts += 1;
        if self.fail_start {
            return Err(GatewayError::NoProvider);
        }
        log.events = Some(events);
        Ok(())
    }

    fn stop_streaming(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }

    fn last_known_position(&mut self) -> Option<Position> {
        self.last_known.clone()
    }
}

/// Let the actor drain its command queue.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn fix(latitude: f64, longitude: f64) -> Position {
    Position {
        latitude,
        longitude,
        altitude: None,
        accuracy: Some(5.0),
        speed: None,
        bearing: None,
        timestamp_ms: 1_700_000_000_000,
    }
}

// Scenario A: a watch starts the provider and survives dispatches.
#[tokio::test(start_paused = true)]
async fn watch_starts_provider_and_keeps_receiving() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let mut rx = assert_ok!(mux.watch("w1"));
    settle().await;
    assert_eq!(gateway.starts(), 1);

    gateway.events().on_position(fix(52.0, 5.0));
    settle().await;
    assert_eq!(rx.recv().await, Some(Outcome::Position(fix(52.0, 5.0))));
    assert_eq!(gateway.stops(), 0);

    gateway.events().on_position(fix(52.1, 5.1));
    settle().await;
    assert_eq!(rx.recv().await, Some(Outcome::Position(fix(52.1, 5.1))));
    assert_eq!(gateway.stops(), 0);
}

// Scenario B: a lone one-shot that never gets an answer times out and the
// provider is stopped.
#[tokio::test(start_paused = true)]
async fn one_shot_times_out_and_provider_stops() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let rx = assert_ok!(mux.get_position(Duration::from_millis(1000)));
    settle().await;
    assert_eq!(gateway.starts(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    match rx.await.unwrap() {
        Outcome::Error(err) => assert_eq!(err.kind, ErrorKind::Timeout),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(gateway.stops(), 1);
}

// Scenario C: a position arriving well before the deadline resolves the
// one-shot exactly once and the deadline never fires.
#[tokio::test(start_paused = true)]
async fn early_position_cancels_the_deadline() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let rx = assert_ok!(mux.get_position(Duration::from_millis(5000)));
    settle().await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    gateway.events().on_position(fix(48.8, 2.3));
    settle().await;

    assert_eq!(rx.await.unwrap(), Outcome::Position(fix(48.8, 2.3)));
    assert_eq!(gateway.stops(), 1);

    // Sail past the original deadline; nothing else may happen.
    tokio::time::sleep(Duration::from_millis(6000)).await;
    assert_eq!(gateway.stops(), 1);
    assert_eq!(gateway.starts(), 1);
}

// Scenario D: provider disabled fails everyone; the watch is retained and
// the multiplexer stays active.
#[tokio::test(start_paused = true)]
async fn provider_disabled_fails_all_but_keeps_watches() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let mut watch_rx = assert_ok!(mux.watch("w1"));
    let shot_rx = assert_ok!(mux.get_position(Duration::from_millis(1000)));
    settle().await;

    gateway.events().on_provider_disabled();
    settle().await;

    match shot_rx.await.unwrap() {
        Outcome::Error(err) => assert_eq!(err.kind, ErrorKind::PositionUnavailable),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match watch_rx.recv().await.unwrap() {
        Outcome::Error(err) => assert_eq!(err.code(), 2),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The watch is still registered: the provider keeps streaming and later
    // fixes still arrive.
    assert_eq!(gateway.stops(), 0);
    gateway.events().on_position(fix(52.0, 5.0));
    settle().await;
    assert_eq!(watch_rx.recv().await, Some(Outcome::Position(fix(52.0, 5.0))));
}

// Scenario E: destroy removes everything silently.
#[tokio::test(start_paused = true)]
async fn destroy_drops_consumers_without_outcomes() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let mut watch_rx = assert_ok!(mux.watch("w1"));
    let shot_rx = assert_ok!(mux.get_position(Duration::from_millis(5000)));
    settle().await;

    mux.destroy();
    settle().await;

    // No outcome was delivered; the channels just close.
    assert!(shot_rx.await.is_err());
    assert_eq!(watch_rx.recv().await, None);
    assert_eq!(gateway.stops(), 1);

    // Registration after destroy fails synchronously.
    assert!(mux.get_position(Duration::from_millis(100)).is_err());
    assert!(mux.watch("w2").is_err());
}

#[tokio::test(start_paused = true)]
async fn deadline_racing_an_arrival_resolves_exactly_once() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let rx = assert_ok!(mux.get_position(Duration::from_millis(1000)));
    settle().await;

    // Land exactly on the deadline and inject a position at the same
    // instant. The actor serializes both; whichever command wins resolves
    // the request, and the loser finds nothing left to resolve.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    gateway.events().on_position(fix(52.0, 5.0));
    settle().await;

    match rx.await.unwrap() {
        Outcome::Position(_) => {}
        Outcome::Error(err) => assert_eq!(err.kind, ErrorKind::Timeout),
    }
    // The losing command dispatched into an empty registry; no double stop.
    assert_eq!(gateway.stops(), 1);
    assert_eq!(gateway.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn provider_runs_iff_consumers_are_active() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let _w1 = assert_ok!(mux.watch("w1"));
    let _w2 = assert_ok!(mux.watch("w2"));
    let shot_rx = assert_ok!(mux.get_position(Duration::from_millis(5000)));
    settle().await;
    assert_eq!(gateway.starts(), 1);

    gateway.events().on_position(fix(1.0, 2.0));
    settle().await;
    assert!(shot_rx.await.is_ok());
    assert_eq!(gateway.stops(), 0);

    mux.clear_watch("w1");
    settle().await;
    assert_eq!(gateway.stops(), 0);

    mux.clear_watch("w2");
    settle().await;
    assert_eq!(gateway.stops(), 1);

    // A new consumer starts a second streaming cycle.
    let _w3 = assert_ok!(mux.watch("w3"));
    settle().await;
    assert_eq!(gateway.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn clearing_an_unknown_key_changes_nothing() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let mut rx = assert_ok!(mux.watch("w1"));
    settle().await;

    mux.clear_watch("never-registered");
    settle().await;
    assert_eq!(gateway.stops(), 0);

    gateway.events().on_position(fix(9.0, 9.0));
    settle().await;
    assert_eq!(rx.recv().await, Some(Outcome::Position(fix(9.0, 9.0))));
}

#[tokio::test(start_paused = true)]
async fn re_registering_a_key_replaces_the_watch() {
    let gateway = FakeGateway::default();
    let mux = PositionMux::spawn(gateway.clone());

    let mut old_rx = assert_ok!(mux.watch("w1"));
    let mut new_rx = assert_ok!(mux.watch("w1"));
    settle().await;
    assert_eq!(gateway.starts(), 1);

    gateway.events().on_position(fix(3.0, 4.0));
    settle().await;
    assert_eq!(new_rx.recv().await, Some(Outcome::Position(fix(3.0, 4.0))));
    // The replaced sink was dropped without delivery.
    assert_eq!(old_rx.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn cached_fix_resolves_one_shot_without_streaming() {
    let gateway = FakeGateway::with_last_known(fix(59.3, 18.0));
    let mux = PositionMux::spawn(gateway.clone());

    let rx = assert_ok!(mux.get_position(Duration::from_millis(1000)));
    settle().await;

    assert_eq!(rx.await.unwrap(), Outcome::Position(fix(59.3, 18.0)));
    assert_eq!(gateway.starts(), 0);

    // And no deadline was armed: nothing fires later.
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(gateway.starts(), 0);
    assert_eq!(gateway.stops(), 0);
}

#[tokio::test(start_paused = true)]
async fn gateway_start_failure_fails_the_new_one_shot_only() {
    let gateway = FakeGateway::failing();
    let mux = PositionMux::spawn(gateway.clone());

    let rx = assert_ok!(mux.get_position(Duration::from_millis(1000)));
    settle().await;

    match rx.await.unwrap() {
        Outcome::Error(err) => assert_eq!(err.kind, ErrorKind::PositionUnavailable),
        other => panic!("unexpected outcome: {other:?}"),
    }
    // Reverted to idle: never streamed, so never stopped.
    assert_eq!(gateway.starts(), 1);
    assert_eq!(gateway.stops(), 0);
}

#[tokio::test(start_paused = true)]
async fn gateway_start_failure_drops_the_new_watch() {
    let gateway = FakeGateway::failing();
    let mux = PositionMux::spawn(gateway.clone());

    let mut rx = assert_ok!(mux.watch("w1"));
    settle().await;

    match rx.recv().await.unwrap() {
        Outcome::Error(err) => assert_eq!(err.kind, ErrorKind::PositionUnavailable),
        other => panic!("unexpected outcome: {other:?}"),
    }
    // The watch was not retained; its sink is gone.
    assert_eq!(rx.recv().await, None);
}
