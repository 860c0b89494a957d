// ── Bridge ──
//
// Entry point for the RPC layer. Owns the session slot, the zone store
// and the retry queue; reads come straight from the store and commands go
// through the dispatcher below.

use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use roon_bridge_api::models::Zone;

use crate::command::{self, BridgeRequest, CommandResult};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::pairing::SessionSlot;
use crate::retry::RetryQueue;
use crate::service::StatusReporter;
use crate::store::ZoneStore;
use crate::stream::ZoneSubscription;

/// Cheaply cloneable handle to the bridge state.
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    pub(crate) pairing: SessionSlot,
    pub(crate) store: Arc<ZoneStore>,
    pub(crate) retries: Arc<RetryQueue>,
    pub(crate) status: Arc<dyn StatusReporter>,
    pub(crate) cancel: CancellationToken,
    pub(crate) feed_cancel: Mutex<Option<CancellationToken>>,
}

impl Bridge {
    /// A bridge with no core paired.
    pub fn new(config: &BridgeConfig, status: Arc<dyn StatusReporter>) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                pairing: SessionSlot::new(),
                store: Arc::new(ZoneStore::new(config.subscriber_buffer)),
                retries: Arc::new(RetryQueue::new()),
                status,
                cancel: CancellationToken::new(),
                feed_cancel: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ZoneStore> {
        &self.inner.store
    }

    /// Stop background work. Does not touch the link; the supervisor owns it.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    // ── Zone reads ───────────────────────────────────────────────

    pub async fn get_zone(&self, zone_id: &str) -> Result<Arc<Zone>, BridgeError> {
        self.require_paired()?;
        self.inner
            .store
            .zone(zone_id)
            .await
            .ok_or_else(|| BridgeError::zone_not_found(zone_id))
    }

    pub async fn list_zones(&self) -> Result<Arc<Vec<Arc<Zone>>>, BridgeError> {
        self.require_paired()?;
        Ok(self.inner.store.list().await)
    }

    /// Open a zone event stream. Works while unpaired: the first event is
    /// then an empty snapshot.
    pub async fn subscribe_zones(&self) -> ZoneSubscription {
        self.inner.store.subscribe().await
    }

    /// Commands waiting for the next pairing to replay.
    pub async fn queued_retries(&self) -> usize {
        self.inner.retries.pending().await
    }

    fn require_paired(&self) -> Result<(), BridgeError> {
        if self.is_paired() {
            Ok(())
        } else {
            Err(BridgeError::Unavailable)
        }
    }

    // ── Command dispatch ─────────────────────────────────────────

    /// Validate and forward a request to the paired core.
    ///
    /// A command that fails because the link dropped waits for the next
    /// pairing and is replayed once; the caller gets the replay's outcome.
    pub async fn execute<R: BridgeRequest>(&self, request: &R) -> Result<CommandResult, BridgeError> {
        let mut replay = false;
        loop {
            let session = self
                .inner
                .pairing
                .current()
                .ok_or(BridgeError::Unavailable)?;
            let command = self
                .inner
                .store
                .with_cache(|zones| request.validate(zones))
                .await?;

            debug!(method = R::METHOD, replay, "dispatching command");
            match command::route(&session, command).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && !replay => {
                    warn!(method = R::METHOD, error = %e, "command lost with the link, queued for replay");
                    drop(session);
                    let (ready_tx, ready_rx) = oneshot::channel();
                    self.inner
                        .retries
                        .enqueue(R::METHOD, move || {
                            let _ = ready_tx.send(());
                        })
                        .await;
                    if ready_rx.await.is_err() {
                        return Err(BridgeError::Internal(e.to_string()));
                    }
                    replay = true;
                }
                Err(e) => {
                    warn!(method = R::METHOD, replay, error = %e, "command failed");
                    return Err(BridgeError::Internal(e.to_string()));
                }
            }
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("paired", &self.is_paired())
            .finish_non_exhaustive()
    }
}
