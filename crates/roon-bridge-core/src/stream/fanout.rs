use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use roon_bridge_api::models::Zone;

use super::{ZoneEvent, ZoneSubscription};

/// Open zone subscriptions.
///
/// Writes never block: each subscriber has a bounded buffer, and one that
/// is full or closed is dropped during the publish pass.
#[derive(Debug)]
pub struct SubscriberFanout {
    subscribers: Vec<(u64, mpsc::Sender<ZoneEvent>)>,
    next_id: u64,
    buffer: usize,
}

impl SubscriberFanout {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber whose first event is `snapshot`.
    pub fn subscribe(&mut self, snapshot: Vec<Arc<Zone>>) -> ZoneSubscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id;
        self.next_id += 1;

        // Fresh channel with capacity >= 1 always has room for the snapshot
        let _ = tx.try_send(ZoneEvent::Subscribed(Arc::new(snapshot)));
        self.subscribers.push((id, tx));
        debug!(subscriber = id, total = self.subscribers.len(), "zone subscriber added");
        ZoneSubscription::new(id, rx)
    }

    /// Deliver `event` to every live subscriber, pruning the rest.
    pub fn publish(&mut self, event: &ZoneEvent) {
        self.subscribers.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = id, "zone subscriber fell behind, dropping it");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = id, "zone subscriber gone");
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn zone(id: &str) -> Arc<Zone> {
        Arc::new(Zone {
            zone_id: id.into(),
            ..Zone::default()
        })
    }

    #[tokio::test]
    async fn new_subscriber_gets_snapshot_first() {
        let mut fanout = SubscriberFanout::new(4);
        let mut sub = fanout.subscribe(vec![zone("Z1")]);

        let ZoneEvent::Subscribed(zones) = sub.recv().await.unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(zones.len(), 1);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_publish() {
        let mut fanout = SubscriberFanout::new(4);
        let mut kept = fanout.subscribe(Vec::new());
        let cancelled = fanout.subscribe(Vec::new());
        drop(cancelled);

        fanout.publish(&ZoneEvent::Unsubscribed);

        assert_eq!(fanout.len(), 1);
        kept.recv().await.unwrap();
        assert_eq!(kept.recv().await.unwrap(), ZoneEvent::Unsubscribed);
    }

    #[tokio::test]
    async fn full_subscriber_is_dropped_and_its_stream_ends() {
        let mut fanout = SubscriberFanout::new(1);
        let mut slow = fanout.subscribe(Vec::new());

        // Buffer still holds the snapshot
        fanout.publish(&ZoneEvent::Unsubscribed);
        assert!(fanout.is_empty());

        assert!(matches!(slow.recv().await, Some(ZoneEvent::Subscribed(_))));
        assert!(slow.recv().await.is_none());
    }
}
