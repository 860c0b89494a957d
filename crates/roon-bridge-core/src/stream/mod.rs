// ── Zone event streams ──
//
// Subscription types handed to streaming RPC callers, and the fanout that
// feeds them from the zone store.

mod fanout;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

use roon_bridge_api::models::{Zone, ZoneDiff};

pub use fanout::SubscriberFanout;

/// A zone-state transition as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneEvent {
    /// Full zone list: sent first on every subscription and after each
    /// snapshot from the core.
    Subscribed(Arc<Vec<Arc<Zone>>>),
    /// The raw diff the core sent, already applied to the cache.
    Changed(Arc<ZoneDiff>),
    /// The core went away; the cache is empty.
    Unsubscribed,
}

/// One subscriber's view of the zone event stream.
///
/// The stream ends when the subscriber is dropped from the fanout
/// because it fell too far behind, or when the bridge shuts down.
pub struct ZoneSubscription {
    id: u64,
    receiver: mpsc::Receiver<ZoneEvent>,
}

impl ZoneSubscription {
    pub(crate) fn new(id: u64, receiver: mpsc::Receiver<ZoneEvent>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ZoneEvent> {
        self.receiver.recv().await
    }
}

impl Stream for ZoneSubscription {
    type Item = ZoneEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for ZoneSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneSubscription").field("id", &self.id).finish()
    }
}
