use thiserror::Error;

/// Top-level error type for the `roon-bridge-api` crate.
///
/// Covers every failure mode of the protocol client: the WebSocket link,
/// MOO framing, service replies, discovery, and the pairing token store.
/// `roon-bridge-core` maps these into dispatcher and supervisor errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The link to the core went away while a request was outstanding,
    /// or a request was issued on a closed link.
    #[error("NetworkError")]
    Network,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── MOO protocol ────────────────────────────────────────────────
    /// A frame could not be parsed as a MOO message.
    #[error("Malformed MOO message: {0}")]
    Protocol(String),

    /// The core answered with something other than `Success`.
    #[error("{name}")]
    Request {
        name: String,
        message: Option<String>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Discovery ───────────────────────────────────────────────────
    /// SOOD socket setup or send failed.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    // ── Local state ─────────────────────────────────────────────────
    /// Reading or writing the pairing token file failed.
    #[error("Token store error at {path}: {message}")]
    TokenStore { path: String, message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth one retry once
    /// the link to the core is back.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Reply name carried by a rejected request, if any.
    pub fn reply_name(&self) -> Option<&str> {
        match self {
            Self::Request { name, .. } => Some(name),
            _ => None,
        }
    }
}
