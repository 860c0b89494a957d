//! One WebSocket link to a Roon core.
//!
//! A [`MooConnection`] owns a writer task and a reader task. Outgoing
//! requests get increasing request ids and a pending entry; the reader
//! routes `CONTINUE`/`COMPLETE` replies back to the caller and forwards
//! `REQUEST`s from the core (pings, status queries) to an inbound channel.
//!
//! When the socket goes away every outstanding request completes with
//! [`Error::Network`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::moo::{MooMessage, Verb};

/// Requests the core sends to us.
pub type InboundRequests = mpsc::UnboundedReceiver<MooMessage>;

/// Replies on a subscription-style request, ending with the `COMPLETE`.
pub type SubscriptionReplies = mpsc::UnboundedReceiver<Result<MooMessage, Error>>;

// ── CloseReason ──────────────────────────────────────────────────────

/// How a link ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame, end of stream, or a local [`MooConnection::close`].
    Clean,
    /// The socket failed.
    Error(String),
}

// ── MooConnection ────────────────────────────────────────────────────

enum Pending {
    Reply(oneshot::Sender<Result<MooMessage, Error>>),
    Subscription(mpsc::UnboundedSender<Result<MooMessage, Error>>),
}

struct ConnectionInner {
    outbound: mpsc::UnboundedSender<Message>,
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
    closed: CancellationToken,
    close_reason: watch::Sender<Option<CloseReason>>,
}

/// Handle to a live MOO link. Cheaply cloneable.
#[derive(Clone)]
pub struct MooConnection {
    inner: Arc<ConnectionInner>,
}

impl MooConnection {
    /// Open `ws://host:port/api` and start the reader/writer tasks.
    pub async fn connect(url: &Url) -> Result<(Self, InboundRequests), Error> {
        info!(url = %url, "connecting to core");
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
        info!(url = %url, "websocket connected");
        Ok(Self::from_stream(ws))
    }

    /// Run the MOO protocol over an already-upgraded WebSocket.
    pub fn from_stream<S>(ws: WebSocketStream<S>) -> (Self, InboundRequests)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (write, read) = ws.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (close_reason, _) = watch::channel(None);

        let inner = Arc::new(ConnectionInner {
            outbound: outbound_tx,
            next_request_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
            close_reason,
        });

        tokio::spawn(write_loop(write, outbound_rx, inner.closed.clone()));
        tokio::spawn(read_loop(Arc::clone(&inner), read, inbound_tx));

        (Self { inner }, inbound_rx)
    }

    /// Send a request and wait for its first reply.
    pub async fn request(&self, endpoint: &str, body: Option<&Value>) -> Result<MooMessage, Error> {
        let (tx, rx) = oneshot::channel();
        self.send_request(endpoint, body, Pending::Reply(tx)).await?;
        rx.await.map_err(|_| Error::Network)?
    }

    /// Send a request whose replies arrive as a stream of `CONTINUE`s
    /// terminated by a `COMPLETE`.
    pub async fn subscribe(
        &self,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<SubscriptionReplies, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.send_request(endpoint, body, Pending::Subscription(tx))
            .await?;
        Ok(rx)
    }

    /// Answer a request the core sent us.
    pub fn send_reply(&self, reply: &MooMessage) -> Result<(), Error> {
        trace!(verb = %reply.verb, name = %reply.name, request_id = reply.request_id, "-> core");
        self.inner
            .outbound
            .send(Message::Binary(reply.encode().into()))
            .map_err(|_| Error::Network)
    }

    /// Whether both handles refer to the same link.
    pub fn same_link(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the link has gone away.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Wait for the link to end and report how.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.inner.close_reason.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(CloseReason::Clean),
            Err(_) => CloseReason::Clean,
        }
    }

    /// Close the link. Outstanding requests fail with [`Error::Network`].
    pub fn close(&self) {
        self.inner.closed.cancel();
    }

    async fn send_request(
        &self,
        endpoint: &str,
        body: Option<&Value>,
        pending: Pending,
    ) -> Result<(), Error> {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut message = MooMessage::request(request_id, endpoint);
        if let Some(body) = body {
            message = message.with_json(body)?;
        }

        {
            let mut map = self.inner.pending.lock().await;
            // Checked under the lock so the reader's drain can't miss us.
            if self.inner.closed.is_cancelled() {
                return Err(Error::Network);
            }
            map.insert(request_id, pending);
        }

        trace!(endpoint, request_id, "-> core");
        if self
            .inner
            .outbound
            .send(Message::Binary(message.encode().into()))
            .is_err()
        {
            self.inner.pending.lock().await.remove(&request_id);
            return Err(Error::Network);
        }
        Ok(())
    }
}

impl ConnectionInner {
    async fn dispatch(&self, data: &[u8], inbound: &mpsc::UnboundedSender<MooMessage>) {
        let message = match MooMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping malformed message from core");
                return;
            }
        };
        trace!(
            verb = %message.verb,
            name = %message.name,
            request_id = message.request_id,
            "<- core"
        );

        match message.verb {
            Verb::Request => {
                // Nobody serving inbound requests just means the link is shutting down
                let _ = inbound.send(message);
            }
            Verb::Continue => {
                let mut pending = self.pending.lock().await;
                match pending.get(&message.request_id) {
                    Some(Pending::Subscription(tx)) => {
                        let _ = tx.send(Ok(message));
                    }
                    Some(Pending::Reply(_)) => {
                        if let Some(Pending::Reply(tx)) = pending.remove(&message.request_id) {
                            let _ = tx.send(Ok(message));
                        }
                    }
                    None => debug!(request_id = message.request_id, "CONTINUE for unknown request"),
                }
            }
            Verb::Complete => {
                let entry = self.pending.lock().await.remove(&message.request_id);
                match entry {
                    Some(Pending::Reply(tx)) => {
                        let _ = tx.send(Ok(message));
                    }
                    Some(Pending::Subscription(tx)) => {
                        let _ = tx.send(Ok(message));
                    }
                    None => debug!(request_id = message.request_id, "COMPLETE for unknown request"),
                }
            }
        }
    }

    async fn fail_pending(&self) {
        let drained: Vec<_> = self.pending.lock().await.drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "failing outstanding requests");
        }
        for (_, entry) in drained {
            match entry {
                Pending::Reply(tx) => {
                    let _ = tx.send(Err(Error::Network));
                }
                Pending::Subscription(tx) => {
                    let _ = tx.send(Err(Error::Network));
                }
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn read_loop<S>(
    inner: Arc<ConnectionInner>,
    mut read: futures_util::stream::SplitStream<WebSocketStream<S>>,
    inbound: mpsc::UnboundedSender<MooMessage>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reason = loop {
        tokio::select! {
            biased;
            () = inner.closed.cancelled() => break CloseReason::Clean,
            frame = read.next() => match frame {
                Some(Ok(Message::Binary(data))) => inner.dispatch(&data, &inbound).await,
                Some(Ok(Message::Text(text))) => inner.dispatch(text.as_bytes(), &inbound).await,
                Some(Ok(Message::Close(frame))) => {
                    if let Some(cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "core closed the link");
                    } else {
                        info!("core closed the link");
                    }
                    break CloseReason::Clean;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break CloseReason::Error(e.to_string()),
                None => {
                    info!("websocket stream ended");
                    break CloseReason::Clean;
                }
            }
        }
    };

    inner.closed.cancel();
    inner.fail_pending().await;
    inner.close_reason.send_replace(Some(reason));
}

async fn write_loop<S>(
    mut write: futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = closed.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            message = outbound.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = write.send(message).await {
                    debug!(error = %e, "websocket write failed");
                    closed.cancel();
                    break;
                }
            }
        }
    }
}
