use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{TRANSPORT_SERVICE, expect_success};
use crate::connection::{MooConnection, SubscriptionReplies};
use crate::error::Error;
use crate::models::{
    Control, MuteHow, SeekHow, SettingsChange, VolumeHow, ZoneDiff, ZoneFeedEvent, ZonesSnapshot,
};

/// Client for `com.roonlabs.transport:2`.
///
/// Commands take ids; callers resolve zones and outputs first.
#[derive(Clone)]
pub struct TransportClient {
    conn: MooConnection,
    next_subscription: std::sync::Arc<AtomicU64>,
}

impl TransportClient {
    pub fn new(conn: MooConnection) -> Self {
        Self {
            conn,
            next_subscription: std::sync::Arc::new(AtomicU64::new(0)),
        }
    }

    async fn call(&self, method: &str, body: &Value) -> Result<(), Error> {
        let endpoint = format!("{TRANSPORT_SERVICE}/{method}");
        let reply = self.conn.request(&endpoint, Some(body)).await?;
        expect_success(reply).map(drop)
    }

    // ── Zone subscription ────────────────────────────────────────────

    /// Subscribe to zone state. The first event is `Subscribed` with the
    /// full zone list; the channel closes when the link goes away.
    pub async fn subscribe_zones(&self) -> Result<mpsc::UnboundedReceiver<ZoneFeedEvent>, Error> {
        let key = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let endpoint = format!("{TRANSPORT_SERVICE}/subscribe_zones");
        let replies = self
            .conn
            .subscribe(&endpoint, Some(&json!({ "subscription_key": key.to_string() })))
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(decode_zone_feed(replies, tx));
        Ok(rx)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn change_volume(&self, output_id: &str, how: VolumeHow, value: f64) -> Result<(), Error> {
        self.call(
            "change_volume",
            &json!({ "output_id": output_id, "how": how, "value": value }),
        )
        .await
    }

    pub async fn mute(&self, output_id: &str, how: MuteHow) -> Result<(), Error> {
        self.call("mute", &json!({ "output_id": output_id, "how": how }))
            .await
    }

    pub async fn mute_all(&self, how: MuteHow) -> Result<(), Error> {
        self.call("mute_all", &json!({ "how": how })).await
    }

    pub async fn pause_all(&self) -> Result<(), Error> {
        self.call("pause_all", &json!({})).await
    }

    pub async fn control(&self, zone_or_output_id: &str, control: Control) -> Result<(), Error> {
        self.call(
            "control",
            &json!({ "zone_or_output_id": zone_or_output_id, "control": control }),
        )
        .await
    }

    pub async fn seek(&self, zone_or_output_id: &str, how: SeekHow, seconds: i64) -> Result<(), Error> {
        self.call(
            "seek",
            &json!({ "zone_or_output_id": zone_or_output_id, "how": how, "seconds": seconds }),
        )
        .await
    }

    pub async fn change_settings(
        &self,
        zone_or_output_id: &str,
        settings: &SettingsChange,
    ) -> Result<(), Error> {
        let mut body = serde_json::to_value(settings).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        if let Value::Object(map) = &mut body {
            map.insert("zone_or_output_id".into(), zone_or_output_id.into());
        }
        self.call("change_settings", &body).await
    }

    pub async fn standby(&self, output_id: &str, control_key: Option<&str>) -> Result<(), Error> {
        self.call("standby", &source_control_body(output_id, control_key))
            .await
    }

    pub async fn toggle_standby(&self, output_id: &str, control_key: Option<&str>) -> Result<(), Error> {
        self.call("toggle_standby", &source_control_body(output_id, control_key))
            .await
    }

    pub async fn convenience_switch(
        &self,
        output_id: &str,
        control_key: Option<&str>,
    ) -> Result<(), Error> {
        self.call("convenience_switch", &source_control_body(output_id, control_key))
            .await
    }

    pub async fn group_outputs(&self, output_ids: &[&str]) -> Result<(), Error> {
        self.call("group_outputs", &json!({ "output_ids": output_ids }))
            .await
    }

    pub async fn ungroup_outputs(&self, output_ids: &[&str]) -> Result<(), Error> {
        self.call("ungroup_outputs", &json!({ "output_ids": output_ids }))
            .await
    }

    pub async fn transfer_zone(
        &self,
        from_zone_or_output_id: &str,
        to_zone_or_output_id: &str,
    ) -> Result<(), Error> {
        self.call(
            "transfer_zone",
            &json!({
                "from_zone_or_output_id": from_zone_or_output_id,
                "to_zone_or_output_id": to_zone_or_output_id,
            }),
        )
        .await
    }
}

fn source_control_body(output_id: &str, control_key: Option<&str>) -> Value {
    match control_key {
        Some(key) => json!({ "output_id": output_id, "control_key": key }),
        None => json!({ "output_id": output_id }),
    }
}

/// Turn raw subscription replies into typed feed events.
async fn decode_zone_feed(mut replies: SubscriptionReplies, tx: mpsc::UnboundedSender<ZoneFeedEvent>) {
    while let Some(reply) = replies.recv().await {
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "zone subscription ended");
                break;
            }
        };

        let event = match reply.name.as_str() {
            "Subscribed" => reply
                .json::<ZonesSnapshot>()
                .map(|snapshot| ZoneFeedEvent::Subscribed(snapshot.zones)),
            "Changed" => reply.json::<ZoneDiff>().map(ZoneFeedEvent::Changed),
            "Unsubscribed" => Ok(ZoneFeedEvent::Unsubscribed),
            other => {
                debug!(name = other, "ignoring zone subscription reply");
                continue;
            }
        };

        match event {
            Ok(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, name = %reply.name, "undecodable zone event"),
        }
    }
}
