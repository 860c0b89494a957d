// ── Core error types ──
//
// `BridgeError` is what RPC callers see: one of four status kinds plus the
// message to report. `ServiceError` is what the command-API handles return.
// `CoreError` covers the connection lifecycle. The `From<roon_bridge_api::Error>`
// impls translate protocol-level failures into these.

use thiserror::Error;

/// Caller-facing error of a bridged operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// No core is paired; the command API is not available.
    #[error("No Roon core paired")]
    Unavailable,

    /// The request is missing or has a malformed argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// A referenced zone or output is not in the cache.
    #[error("{0}")]
    NotFound(String),

    /// The command API failed.
    #[error("Error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn zone_not_found(zone_id: &str) -> Self {
        Self::NotFound(format!("Zone {zone_id} not found"))
    }

    pub fn output_not_found(output_id: &str) -> Self {
        Self::NotFound(format!("Output {output_id} not found"))
    }

    pub fn outputs_not_found(output_ids: &[&str]) -> Self {
        Self::NotFound(format!("Outputs {} not found", output_ids.join(",")))
    }
}

// ── ServiceError ─────────────────────────────────────────────────────

/// Failure reported by a command-API handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The link dropped with the call outstanding. Worth one replay.
    #[error("NetworkError")]
    Network,

    /// The core rejected the call or the reply was unusable.
    #[error("{0}")]
    Failed(String),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }
}

impl From<roon_bridge_api::Error> for ServiceError {
    fn from(err: roon_bridge_api::Error) -> Self {
        if err.is_transient() {
            return Self::Network;
        }
        match err.reply_name() {
            Some(name) => Self::Failed(name.to_owned()),
            None => Self::Failed(err.to_string()),
        }
    }
}

// ── CoreError ────────────────────────────────────────────────────────

/// Connection-lifecycle errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to core: {reason}")]
    ConnectionFailed { reason: String },

    #[error("No Roon core answered discovery")]
    NoCoreFound,

    #[error("Registration with core failed: {message}")]
    RegistrationFailed { message: String },

    #[error("Gave up after {attempts} connection attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error("Local state error: {message}")]
    State { message: String },
}

impl From<roon_bridge_api::Error> for CoreError {
    fn from(err: roon_bridge_api::Error) -> Self {
        match err {
            roon_bridge_api::Error::Request { name, message } => Self::RegistrationFailed {
                message: message.map_or_else(|| name.clone(), |m| format!("{name}: {m}")),
            },
            roon_bridge_api::Error::TokenStore { .. } => Self::State {
                message: err.to_string(),
            },
            other => Self::ConnectionFailed {
                reason: other.to_string(),
            },
        }
    }
}
