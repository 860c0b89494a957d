// ── Pairing lifecycle ──
//
// Installs and tears down the session for a paired core. Pairing starts
// the zone feed for that session; unpairing stops it, empties the zone
// store and flips the extension status.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use roon_bridge_api::CoreInfo;

use crate::bridge::Bridge;
use crate::retry::RetryQueue;
use crate::service::Session;
use crate::store::ZoneStore;

pub(crate) const STATUS_PAIRED: &str = "OK";
pub(crate) const STATUS_UNPAIRED: &str = "No core paired";

/// Pairing state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Unpaired,
    Paired { core: CoreInfo },
}

/// The current session, if any. Writers check-and-set through the watch
/// channel so two pairings can't both install.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    session: watch::Sender<Option<Arc<Session>>>,
    state: watch::Sender<PairingState>,
}

impl SessionSlot {
    pub(crate) fn new() -> Self {
        Self {
            session: watch::Sender::new(None),
            state: watch::Sender::new(PairingState::Unpaired),
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<Session>> {
        self.session.borrow().clone()
    }

    /// Install `session` unless one is already present.
    fn install(&self, session: &Arc<Session>) -> bool {
        let installed = self.session.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::clone(session));
            true
        });
        if installed {
            self.state.send_replace(PairingState::Paired {
                core: session.core.clone(),
            });
        }
        installed
    }

    fn take(&self) -> Option<Arc<Session>> {
        let previous = self.session.send_replace(None);
        if previous.is_some() {
            self.state.send_replace(PairingState::Unpaired);
        }
        previous
    }

    pub(crate) fn watch(&self) -> watch::Receiver<PairingState> {
        self.state.subscribe()
    }
}

// ── Bridge pairing hooks ─────────────────────────────────────────────

impl Bridge {
    /// A core has paired.
    ///
    /// Installs the session, starts the zone subscription and reports a
    /// healthy status. A second pairing while one is active is refused and
    /// the new session dropped.
    pub async fn on_paired(&self, session: Session) {
        let inner = &self.inner;
        let session = Arc::new(session);
        if !inner.pairing.install(&session) {
            error!(
                core = %session.core.display_name,
                "core paired while another is still paired, ignoring"
            );
            return;
        }
        info!(
            core = %session.core.display_name,
            core_id = %session.core.core_id,
            version = %session.core.display_version,
            "core paired"
        );

        let epoch = inner.store.activate().await;
        let cancel = inner.cancel.child_token();
        if let Some(previous) = inner.feed_cancel.lock().await.replace(cancel.clone()) {
            previous.cancel();
        }
        tokio::spawn(zone_feed_task(
            session,
            Arc::clone(&inner.store),
            Arc::clone(&inner.retries),
            epoch,
            cancel,
        ));

        inner.status.set_status(STATUS_PAIRED, false).await;
    }

    /// The paired core went away.
    pub async fn on_unpaired(&self) {
        let inner = &self.inner;
        let Some(session) = inner.pairing.take() else {
            debug!("unpair without a paired core");
            return;
        };
        info!(core = %session.core.display_name, "core unpaired");

        if let Some(feed) = inner.feed_cancel.lock().await.take() {
            feed.cancel();
        }
        inner.store.deactivate().await;
        inner.status.set_status(STATUS_UNPAIRED, true).await;
    }

    /// Subscribe to pairing state changes.
    pub fn pairing_state(&self) -> watch::Receiver<PairingState> {
        self.inner.pairing.watch()
    }

    pub fn is_paired(&self) -> bool {
        self.inner.pairing.current().is_some()
    }
}

/// Feed one session's zone subscription into the store. A fresh snapshot
/// releases any commands waiting for replay.
async fn zone_feed_task(
    session: Arc<Session>,
    store: Arc<ZoneStore>,
    retries: Arc<RetryQueue>,
    epoch: u64,
    cancel: CancellationToken,
) {
    let mut feed = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        feed = session.transport.subscribe_zones() => match feed {
            Ok(feed) => feed,
            Err(e) => {
                warn!(error = %e, "zone subscription failed");
                return;
            }
        },
    };
    debug!(epoch, "zone subscription started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = feed.recv() => {
                let Some(event) = event else {
                    debug!(epoch, "zone subscription ended");
                    break;
                };
                if store.apply(epoch, event).await {
                    retries.drain_and_clear().await;
                }
            }
        }
    }
}
