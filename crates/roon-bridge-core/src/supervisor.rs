// ── Connection supervisor ──
//
// Keeps the bridge paired with a core: connect, register, hand the session
// to the bridge, wait for the link to drop, unpair, repeat. Failed
// attempts back off exponentially. A link that closes after pairing is
// retried right away, unless it closed within `STABLE_LINK` of pairing,
// in which case the first backoff delay applies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use roon_bridge_api::CloseReason;

use crate::bridge::Bridge;
use crate::config::ReconnectConfig;
use crate::error::CoreError;
use crate::service::Session;

/// Links that close sooner than this after pairing wait `initial_delay`
/// before the next attempt.
const STABLE_LINK: Duration = Duration::from_secs(10);

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

// ── Connector seam ───────────────────────────────────────────────────

/// Produces registered links to a core.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Find a core, connect and register. Returns once paired.
    async fn establish(&self) -> Result<Box<dyn Link>, CoreError>;
}

/// One registered link.
#[async_trait]
pub trait Link: Send + Sync {
    /// Command-API handles bound to this link.
    fn session(&self) -> Session;

    /// Resolves when the link ends.
    async fn closed(&self) -> CloseReason;

    fn close(&self);
}

// ── ConnectionSupervisor ─────────────────────────────────────────────

pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    bridge: Bridge,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionSupervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        bridge: Bridge,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            bridge,
            reconnect,
            state: watch::Sender::new(ConnectionState::Disconnected),
            cancel,
        }
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run until cancelled, or until `max_attempts` consecutive attempts
    /// have failed.
    pub async fn run(&self) -> Result<(), CoreError> {
        let mut attempt: u32 = 0;

        loop {
            self.state.send_replace(if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt }
            });

            let established = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.connector.establish() => result,
            };

            match established {
                Ok(link) => {
                    attempt = 0;
                    self.state.send_replace(ConnectionState::Connected);
                    self.bridge.on_paired(link.session()).await;
                    let paired_at = tokio::time::Instant::now();

                    let reason = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            link.close();
                            self.bridge.on_unpaired().await;
                            break;
                        }
                        reason = link.closed() => reason,
                    };
                    self.bridge.on_unpaired().await;

                    match reason {
                        CloseReason::Clean => info!("core connection closed, reconnecting"),
                        CloseReason::Error(e) => {
                            warn!(error = %e, "lost core connection, reconnecting");
                        }
                    }

                    if paired_at.elapsed() < STABLE_LINK {
                        let delay = self.reconnect.initial_delay;
                        warn!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "core link closed right after pairing, delaying reconnect"
                        );
                        tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
                Err(e) => {
                    attempt += 1;
                    warn!(error = %e, attempt, "failed to connect to core");

                    if let Some(max) = self.reconnect.max_attempts {
                        if attempt >= max {
                            error!(max_attempts = max, "connection attempt limit reached, giving up");
                            self.state.send_replace(ConnectionState::Failed);
                            return Err(CoreError::AttemptsExhausted { attempts: attempt });
                        }
                    }

                    let delay = calculate_backoff(attempt - 1, &self.reconnect);
                    info!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        attempt,
                        "waiting before reconnect"
                    );
                    self.state.send_replace(ConnectionState::Reconnecting { attempt });

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.state.send_replace(ConnectionState::Disconnected);
        debug!("connection supervisor exiting");
        Ok(())
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}
