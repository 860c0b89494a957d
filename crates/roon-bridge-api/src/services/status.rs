use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connection::MooConnection;
use crate::moo::{MooMessage, Verb};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StatusBody {
    message: String,
    is_error: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubscriptionKey {
    subscription_key: Option<serde_json::Value>,
}

struct Subscriber {
    conn: MooConnection,
    request_id: u64,
    key: Option<serde_json::Value>,
}

struct StatusState {
    body: StatusBody,
    subscribers: Vec<Subscriber>,
}

/// The `com.roonlabs.status:1` service this extension provides.
///
/// Holds the status line shown for the extension in the Roon UI. It
/// outlives individual links; subscriptions from a closed link are
/// pruned on the next update.
#[derive(Clone)]
pub struct StatusService {
    state: Arc<Mutex<StatusState>>,
}

impl StatusService {
    pub fn new(message: impl Into<String>, is_error: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(StatusState {
                body: StatusBody {
                    message: message.into(),
                    is_error,
                },
                subscribers: Vec::new(),
            })),
        }
    }

    /// Update the status and push it to every subscribed core.
    pub async fn set_status(&self, message: impl Into<String>, is_error: bool) {
        let body = StatusBody {
            message: message.into(),
            is_error,
        };
        if is_error {
            warn!(status = %body.message, "extension status");
        } else {
            info!(status = %body.message, "extension status");
        }

        let mut state = self.state.lock().await;
        state.body = body.clone();
        state.subscribers.retain(|sub| {
            if sub.conn.is_closed() {
                return false;
            }
            let changed = match MooMessage::reply(Verb::Continue, "Changed", sub.request_id)
                .with_json(&body)
            {
                Ok(message) => message,
                Err(_) => return true,
            };
            sub.conn.send_reply(&changed).is_ok()
        });
    }

    /// Current `(message, is_error)`.
    pub async fn current(&self) -> (String, bool) {
        let state = self.state.lock().await;
        (state.body.message.clone(), state.body.is_error)
    }

    /// Number of live status subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        let state = self.state.lock().await;
        state.subscribers.iter().filter(|s| !s.conn.is_closed()).count()
    }

    /// Answer a status request from the core.
    pub(crate) async fn handle(&self, conn: &MooConnection, method: &str, request: &MooMessage) -> MooMessage {
        let id = request.request_id;
        let mut state = self.state.lock().await;
        let reply = match method {
            "get_status" => MooMessage::reply(Verb::Complete, "Success", id).with_json(&state.body),
            "subscribe_status" => {
                let key = request.json::<SubscriptionKey>().unwrap_or_default().subscription_key;
                state.subscribers.push(Subscriber {
                    conn: conn.clone(),
                    request_id: id,
                    key,
                });
                debug!(request_id = id, "core subscribed to status");
                MooMessage::reply(Verb::Continue, "Subscribed", id).with_json(&state.body)
            }
            "unsubscribe_status" => {
                let key = request.json::<SubscriptionKey>().unwrap_or_default().subscription_key;
                state.subscribers.retain(|sub| {
                    if !sub.conn.same_link(conn) || sub.key != key {
                        return true;
                    }
                    let ended = MooMessage::reply(Verb::Complete, "Unsubscribed", sub.request_id);
                    let _ = sub.conn.send_reply(&ended);
                    false
                });
                Ok(MooMessage::reply(Verb::Complete, "Unsubscribed", id))
            }
            _ => MooMessage::reply(Verb::Complete, "InvalidRequest", id)
                .with_json(&serde_json::json!({ "error": format!("unknown method: {method}") })),
        };
        reply.unwrap_or_else(|_| MooMessage::reply(Verb::Complete, "InvalidRequest", id))
    }
}
