// ── Zone store ──
//
// The zone cache, its subscribers and the session epoch behind one lock.
// Every cache mutation publishes to subscribers before the lock is
// released, so a late joiner's snapshot and the events after it line up.

mod zone_cache;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use roon_bridge_api::models::{Output, Zone, ZoneFeedEvent};

use crate::stream::{SubscriberFanout, ZoneEvent, ZoneSubscription};

pub use zone_cache::ZoneCache;

#[derive(Debug)]
struct ZoneStoreState {
    cache: ZoneCache,
    fanout: SubscriberFanout,
    epoch: u64,
    live: bool,
}

/// Zone state shared by the pairing lifecycle, the feed task and RPC
/// handlers.
#[derive(Debug)]
pub struct ZoneStore {
    state: Mutex<ZoneStoreState>,
}

impl ZoneStore {
    pub fn new(subscriber_buffer: usize) -> Self {
        Self {
            state: Mutex::new(ZoneStoreState {
                cache: ZoneCache::new(),
                fanout: SubscriberFanout::new(subscriber_buffer),
                epoch: 0,
                live: false,
            }),
        }
    }

    // ── Session epochs ───────────────────────────────────────────

    /// Start accepting feed events for a new session. Returns the epoch
    /// the session's feed must tag its events with.
    pub async fn activate(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        state.live = true;
        state.cache.clear();
        debug!(epoch = state.epoch, "zone store activated");
        state.epoch
    }

    /// Stop accepting feed events, empty the cache and tell subscribers.
    pub async fn deactivate(&self) {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        state.live = false;
        state.cache.clear();
        state.fanout.publish(&ZoneEvent::Unsubscribed);
        debug!(subscribers = state.fanout.len(), "zone store deactivated");
    }

    /// Apply one feed event from the session that owns `epoch`.
    ///
    /// Returns `true` when the event was a fresh snapshot. Events from an
    /// older session are dropped.
    pub async fn apply(&self, epoch: u64, event: ZoneFeedEvent) -> bool {
        let mut state = self.state.lock().await;
        if !state.live || state.epoch != epoch {
            trace!(epoch, current = state.epoch, "dropping stale zone event");
            return false;
        }

        match event {
            ZoneFeedEvent::Subscribed(zones) => {
                state.cache.replace_all(zones);
                let snapshot = Arc::new(state.cache.snapshot());
                debug!(zones = snapshot.len(), "zone snapshot applied");
                state.fanout.publish(&ZoneEvent::Subscribed(snapshot));
                true
            }
            ZoneFeedEvent::Changed(diff) => {
                state.cache.apply_diff(&diff);
                trace!(
                    removed = diff.zones_removed.len(),
                    added = diff.zones_added.len(),
                    changed = diff.zones_changed.len(),
                    seek = diff.zones_seek_changed.len(),
                    "zone diff applied"
                );
                state.fanout.publish(&ZoneEvent::Changed(Arc::new(diff)));
                false
            }
            ZoneFeedEvent::Unsubscribed => {
                state.cache.clear();
                state.fanout.publish(&ZoneEvent::Unsubscribed);
                false
            }
        }
    }

    // ── Readers ──────────────────────────────────────────────────

    pub async fn subscribe(&self) -> ZoneSubscription {
        let mut state = self.state.lock().await;
        let snapshot = state.cache.snapshot();
        state.fanout.subscribe(snapshot)
    }

    pub async fn zone(&self, zone_id: &str) -> Option<Arc<Zone>> {
        self.state.lock().await.cache.zone(zone_id)
    }

    pub async fn output(&self, output_id: &str) -> Option<Output> {
        self.state.lock().await.cache.output(output_id)
    }

    pub async fn list(&self) -> Arc<Vec<Arc<Zone>>> {
        Arc::new(self.state.lock().await.cache.snapshot())
    }

    /// Run `f` against the cache while holding the lock.
    pub async fn with_cache<T>(&self, f: impl FnOnce(&ZoneCache) -> T) -> T {
        let state = self.state.lock().await;
        f(&state.cache)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.fanout.len()
    }
}
