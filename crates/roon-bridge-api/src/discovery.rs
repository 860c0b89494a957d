//! SOOD discovery of Roon cores on the local network.
//!
//! A query is multicast to `239.255.90.90:9003` (and broadcast, for
//! networks that drop multicast). Cores answer with a unicast reply whose
//! properties include their `unique_id` and the `http_port` of the
//! WebSocket endpoint.
//!
//! Wire layout:
//!
//! ```text
//! "SOOD" | version (0x02) | type ('Q' or 'R') | property*
//! property = key_len (u8) | key | value_len (u16 BE, 0xFFFF = null) | value
//! ```

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

pub const SOOD_PORT: u16 = 9003;
pub const SOOD_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 90, 90);
/// Service id Roon cores answer to.
pub const ROON_API_SERVICE_ID: &str = "00720724-5143-4a9b-abac-0e50cba674bb";

const MAGIC: &[u8; 4] = b"SOOD";
const VERSION: u8 = 2;
const NULL_VALUE_LEN: u16 = 0xFFFF;

// ── Message ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoodKind {
    Query,
    Reply,
}

/// One SOOD datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoodMessage {
    pub kind: SoodKind,
    pub props: BTreeMap<String, Option<String>>,
}

impl SoodMessage {
    /// Query for cores offering `service_id`.
    pub fn query(service_id: &str, transaction_id: &str) -> Self {
        let mut props = BTreeMap::new();
        props.insert("query_service_id".to_owned(), Some(service_id.to_owned()));
        props.insert("_tid".to_owned(), Some(transaction_id.to_owned()));
        Self {
            kind: SoodKind::Query,
            props,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Option::as_deref)
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(match self.kind {
            SoodKind::Query => b'Q',
            SoodKind::Reply => b'R',
        });

        for (key, value) in &self.props {
            let key_len = u8::try_from(key.len())
                .map_err(|_| Error::Discovery(format!("property key too long: {key}")))?;
            out.push(key_len);
            out.extend_from_slice(key.as_bytes());
            match value {
                Some(value) => {
                    let len = u16::try_from(value.len())
                        .ok()
                        .filter(|&len| len != NULL_VALUE_LEN)
                        .ok_or_else(|| Error::Discovery(format!("property value too long: {key}")))?;
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend_from_slice(value.as_bytes());
                }
                None => out.extend_from_slice(&NULL_VALUE_LEN.to_be_bytes()),
            }
        }
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let bad = |what: &str| Error::Discovery(format!("malformed SOOD datagram: {what}"));

        if data.len() < 6 || &data[..4] != MAGIC {
            return Err(bad("missing magic"));
        }
        if data[4] != VERSION {
            return Err(bad("unsupported version"));
        }
        let kind = match data[5] {
            b'Q' => SoodKind::Query,
            b'R' => SoodKind::Reply,
            _ => return Err(bad("unknown message type")),
        };

        let mut props = BTreeMap::new();
        let mut rest = &data[6..];
        while let Some((&key_len, tail)) = rest.split_first() {
            let key_len = usize::from(key_len);
            if key_len == 0 {
                return Err(bad("empty property key"));
            }
            let key = tail.get(..key_len).ok_or_else(|| bad("truncated key"))?;
            let tail = &tail[key_len..];
            let len_bytes: [u8; 2] = tail
                .get(..2)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| bad("truncated value length"))?;
            let tail = &tail[2..];
            let value_len = u16::from_be_bytes(len_bytes);

            let key = String::from_utf8_lossy(key).into_owned();
            if value_len == NULL_VALUE_LEN {
                props.insert(key, None);
                rest = tail;
            } else {
                let value_len = usize::from(value_len);
                let value = tail.get(..value_len).ok_or_else(|| bad("truncated value"))?;
                props.insert(key, Some(String::from_utf8_lossy(value).into_owned()));
                rest = &tail[value_len..];
            }
        }

        Ok(Self { kind, props })
    }
}

// ── Discovery ────────────────────────────────────────────────────────

/// A core that answered a discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCore {
    pub unique_id: String,
    pub display_name: Option<String>,
    pub addr: SocketAddr,
}

impl DiscoveredCore {
    /// Build from a reply datagram received from `from`.
    pub fn from_reply(message: &SoodMessage, from: SocketAddr) -> Option<Self> {
        if message.kind != SoodKind::Reply || message.get("service_id") != Some(ROON_API_SERVICE_ID) {
            return None;
        }
        let unique_id = message.get("unique_id")?.to_owned();
        let port = message.get("http_port")?.parse::<u16>().ok()?;
        Some(Self {
            unique_id,
            display_name: message.get("name").map(str::to_owned),
            addr: SocketAddr::new(from.ip(), port),
        })
    }

    /// The MOO WebSocket endpoint of this core.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        websocket_url(self.addr.ip(), self.addr.port())
    }
}

/// `ws://host:port/api`
pub fn websocket_url(host: impl std::fmt::Display, port: u16) -> Result<Url, Error> {
    let host = host.to_string();
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host
    };
    Ok(Url::parse(&format!("ws://{host}:{port}/api"))?)
}

/// Query the network and collect every core that answers within `window`.
pub async fn discover(window: Duration) -> Result<Vec<DiscoveredCore>, Error> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| Error::Discovery(e.to_string()))?;
    socket
        .set_broadcast(true)
        .map_err(|e| Error::Discovery(e.to_string()))?;

    let tid = uuid::Uuid::new_v4().to_string();
    let query = SoodMessage::query(ROON_API_SERVICE_ID, &tid).encode()?;

    socket
        .send_to(&query, (SOOD_MULTICAST_ADDR, SOOD_PORT))
        .await
        .map_err(|e| Error::Discovery(e.to_string()))?;
    if let Err(e) = socket.send_to(&query, (Ipv4Addr::BROADCAST, SOOD_PORT)).await {
        // Broadcast is often refused in containers; multicast already went out
        debug!(error = %e, "SOOD broadcast failed");
    }

    let deadline = Instant::now() + window;
    let mut seen = HashSet::new();
    let mut cores = Vec::new();
    let mut buf = [0_u8; 2048];

    while let Ok(received) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
        let (len, from) = match received {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "SOOD receive failed");
                continue;
            }
        };
        let Ok(message) = SoodMessage::decode(&buf[..len]) else {
            trace!(%from, "ignoring non-SOOD datagram");
            continue;
        };
        if message.get("_tid").is_some_and(|t| t != tid) {
            continue;
        }
        if let Some(core) = DiscoveredCore::from_reply(&message, from) {
            if seen.insert(core.unique_id.clone()) {
                debug!(unique_id = %core.unique_id, addr = %core.addr, "discovered core");
                cores.push(core);
            }
        }
    }

    Ok(cores)
}

// ── Tests ────────────────────────────────────────────────────────────
