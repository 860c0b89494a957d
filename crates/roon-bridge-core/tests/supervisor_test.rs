#![allow(clippy::unwrap_used)]

mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use roon_bridge_api::CloseReason;
use roon_bridge_core::{
    Bridge, BridgeConfig, ConnectionState, ConnectionSupervisor, Connector, CoreError, Link,
    PairingState, ReconnectConfig, Session,
};

use common::{FakeCore, RecordingStatus, zone};

/// A link that stays open until `close` or its token is cancelled.
struct FakeLink {
    session: Session,
    closed: CancellationToken,
}

#[async_trait]
impl Link for FakeLink {
    fn session(&self) -> Session {
        self.session.clone()
    }

    async fn closed(&self) -> CloseReason {
        self.closed.cancelled().await;
        CloseReason::Clean
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

enum Step {
    Fail,
    /// Pair, then close after the given delay.
    Link(Duration),
}

/// Plays back a script of outcomes, failing once it runs out.
struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
}

impl ScriptedConnector {
    fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn establish(&self) -> Result<Box<dyn Link>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Fail);
        match step {
            Step::Fail => Err(CoreError::ConnectionFailed {
                reason: "connection refused".into(),
            }),
            Step::Link(open_for) => {
                let (core, _feed) = FakeCore::with_zones(vec![zone("Z1", &["O1"])]);
                let closed = CancellationToken::new();
                let token = closed.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(open_for).await;
                    token.cancel();
                });
                Ok(Box::new(FakeLink {
                    session: core.session("C1"),
                    closed,
                }))
            }
        }
    }
}

fn bridge() -> Bridge {
    Bridge::new(&BridgeConfig::default(), Arc::new(RecordingStatus::default()))
}

fn bounded(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        max_attempts: Some(max_attempts),
        ..ReconnectConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn bounded_mode_gives_up_after_max_attempts() {
    let connector = ScriptedConnector::new([]);
    let supervisor = ConnectionSupervisor::new(connector.clone(), bridge(), bounded(3), CancellationToken::new());
    let state = supervisor.connection_state();

    let result = supervisor.run().await;

    assert!(matches!(result, Err(CoreError::AttemptsExhausted { attempts: 3 })));
    assert_eq!(connector.calls(), 3);
    assert_eq!(*state.borrow(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn clean_close_resets_the_attempt_counter() {
    let connector = ScriptedConnector::new([Step::Fail, Step::Link(Duration::from_secs(1))]);
    let supervisor = ConnectionSupervisor::new(connector.clone(), bridge(), bounded(2), CancellationToken::new());

    let result = supervisor.run().await;

    // fail, link, fail, fail: without the reset the third call would give up
    assert!(matches!(result, Err(CoreError::AttemptsExhausted { attempts: 2 })));
    assert_eq!(connector.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_back_off() {
    let connector = ScriptedConnector::new([]);
    let supervisor = ConnectionSupervisor::new(connector.clone(), bridge(), bounded(3), CancellationToken::new());

    let started = tokio::time::Instant::now();
    supervisor.run().await.unwrap_err();

    // Two sleeps between three attempts: ~5s then ~10s, each within 25% jitter
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(11), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(19), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn link_dropped_right_after_pairing_delays_reconnect() {
    let connector = ScriptedConnector::new([
        Step::Link(Duration::from_millis(100)),
        Step::Link(Duration::from_millis(100)),
    ]);
    let supervisor = ConnectionSupervisor::new(connector.clone(), bridge(), bounded(1), CancellationToken::new());

    let started = tokio::time::Instant::now();
    let result = supervisor.run().await;

    // link, 5s floor, link, 5s floor, fail
    assert!(matches!(result, Err(CoreError::AttemptsExhausted { attempts: 1 })));
    assert_eq!(connector.calls(), 3);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10), "waited {waited:?}");
    assert!(waited < Duration::from_secs(11), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn long_lived_link_reconnects_without_delay() {
    let connector = ScriptedConnector::new([Step::Link(Duration::from_secs(30))]);
    let supervisor = ConnectionSupervisor::new(connector.clone(), bridge(), bounded(1), CancellationToken::new());

    let started = tokio::time::Instant::now();
    supervisor.run().await.unwrap_err();

    assert_eq!(connector.calls(), 2);
    let waited = started.elapsed();
    assert!(waited < Duration::from_secs(31), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn link_pairs_the_bridge_until_it_closes() {
    let bridge = bridge();
    let connector = ScriptedConnector::new([Step::Link(Duration::from_secs(30))]);
    let cancel = CancellationToken::new();
    let supervisor = Arc::new(ConnectionSupervisor::new(
        connector.clone(),
        bridge.clone(),
        ReconnectConfig::default(),
        cancel.clone(),
    ));
    let mut pairing = bridge.pairing_state();
    let mut state = supervisor.connection_state();

    let task = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    pairing
        .wait_for(|s| matches!(s, PairingState::Paired { .. }))
        .await
        .unwrap();
    assert_eq!(*state.borrow_and_update(), ConnectionState::Connected);

    pairing.wait_for(|s| *s == PairingState::Unpaired).await.unwrap();
    state
        .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
        .await
        .unwrap();

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(*supervisor.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_paired_unpairs_and_exits() {
    let bridge = bridge();
    let connector = ScriptedConnector::new([Step::Link(Duration::from_secs(3600))]);
    let cancel = CancellationToken::new();
    let supervisor = Arc::new(ConnectionSupervisor::new(
        connector,
        bridge.clone(),
        ReconnectConfig::default(),
        cancel.clone(),
    ));
    let mut pairing = bridge.pairing_state();

    let task = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });
    pairing
        .wait_for(|s| matches!(s, PairingState::Paired { .. }))
        .await
        .unwrap();

    cancel.cancel();
    task.await.unwrap().unwrap();

    assert!(!bridge.is_paired());
}
