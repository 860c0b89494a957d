//! Extension registration and the requests a core sends to an extension.
//!
//! Registration is two round trips on the registry service: `info` tells us
//! which core we reached, `register` presents our identity plus any token
//! saved from an earlier authorization. The core answers `Registered` once
//! the extension is enabled in the Roon UI, which may be much later.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::connection::{InboundRequests, MooConnection};
use crate::error::Error;
use crate::moo::{MooMessage, Verb};
use crate::services::{
    BROWSE_SERVICE, IMAGE_SERVICE, PING_SERVICE, REGISTRY_SERVICE, STATUS_SERVICE,
    StatusService, TRANSPORT_SERVICE, expect_success,
};

const TOKEN_FILE: &str = "config.json";

// ── Identity ─────────────────────────────────────────────────────────

/// How this extension presents itself to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub extension_id: String,
    pub display_name: String,
    pub display_version: String,
    pub publisher: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Identity of a core we are registered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreInfo {
    pub core_id: String,
    pub display_name: String,
    #[serde(default)]
    pub display_version: String,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    #[serde(flatten)]
    info: &'a ExtensionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    required_services: [&'static str; 3],
    optional_services: [&'static str; 0],
    provided_services: [&'static str; 2],
}

#[derive(Deserialize)]
struct Registered {
    core_id: String,
    display_name: String,
    #[serde(default)]
    display_version: String,
    token: String,
}

/// Register with the core on `conn`, persisting the token it hands back.
pub async fn register(
    conn: &MooConnection,
    info: &ExtensionInfo,
    tokens: &mut TokenStore,
) -> Result<CoreInfo, Error> {
    let reply = conn
        .request(&format!("{REGISTRY_SERVICE}/info"), None)
        .await?;
    let core: CoreInfo = expect_success(reply)?.json()?;
    debug!(core_id = %core.core_id, name = %core.display_name, "reached core");

    let request = RegisterRequest {
        info,
        token: tokens.token(&core.core_id),
        required_services: [TRANSPORT_SERVICE, BROWSE_SERVICE, IMAGE_SERVICE],
        optional_services: [],
        provided_services: [STATUS_SERVICE, PING_SERVICE],
    };
    let body = serde_json::to_value(&request).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })?;

    info!(core = %core.display_name, "waiting for the extension to be enabled in Roon");
    let reply = conn
        .request(&format!("{REGISTRY_SERVICE}/register"), Some(&body))
        .await?;
    if reply.name != "Registered" {
        let message = reply
            .json::<serde_json::Value>()
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned));
        return Err(Error::Request {
            name: reply.name,
            message,
        });
    }

    let registered: Registered = reply.json()?;
    tokens.store(&registered.core_id, &registered.token)?;
    info!(core = %registered.display_name, version = %registered.display_version, "registered with core");

    Ok(CoreInfo {
        core_id: registered.core_id,
        display_name: registered.display_name,
        display_version: registered.display_version,
    })
}

/// Serve the requests the core sends to us until the link closes.
pub async fn serve_core_requests(conn: MooConnection, mut inbound: InboundRequests, status: StatusService) {
    while let Some(request) = inbound.recv().await {
        let reply = match request.endpoint() {
            Some((PING_SERVICE, "ping")) => MooMessage::reply(Verb::Complete, "Success", request.request_id),
            Some((STATUS_SERVICE, method)) => status.handle(&conn, method, &request).await,
            _ => {
                debug!(name = %request.name, "unsupported request from core");
                MooMessage::reply(Verb::Complete, "InvalidRequest", request.request_id)
                    .with_json(&serde_json::json!({ "error": format!("unknown request: {}", request.name) }))
                    .unwrap_or_else(|_| MooMessage::reply(Verb::Complete, "InvalidRequest", request.request_id))
            }
        };
        if conn.send_reply(&reply).is_err() {
            break;
        }
    }
    debug!("core request loop ended");
}

// ── Token store ──────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    roonstate: RoonState,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoonState {
    #[serde(default)]
    tokens: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paired_core_id: Option<String>,
}

/// Pairing tokens per core id, persisted as `config.json`.
///
/// The layout matches the one the Node extension library writes, so an
/// authorization granted to an earlier deployment keeps working.
#[derive(Debug, Default)]
pub struct TokenStore {
    path: Option<PathBuf>,
    state: RoonState,
}

impl TokenStore {
    /// An in-memory store; tokens are lost on exit.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load `config.json` from `dir`, starting empty if it doesn't exist.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(TOKEN_FILE);
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<TokenFile>(&raw) {
                Ok(file) => file.roonstate,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable token file");
                    RoonState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RoonState::default(),
            Err(e) => return Err(token_error(&path, &e)),
        };
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    pub fn token(&self, core_id: &str) -> Option<&str> {
        self.state.tokens.get(core_id).map(String::as_str)
    }

    pub fn paired_core_id(&self) -> Option<&str> {
        self.state.paired_core_id.as_deref()
    }

    /// Record the token for `core_id` and write the file.
    pub fn store(&mut self, core_id: &str, token: &str) -> Result<(), Error> {
        self.state.tokens.insert(core_id.to_owned(), token.to_owned());
        self.state.paired_core_id = Some(core_id.to_owned());

        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| token_error(parent, &e))?;
        }
        let file = TokenFile {
            roonstate: RoonState {
                tokens: self.state.tokens.clone(),
                paired_core_id: self.state.paired_core_id.clone(),
            },
        };
        let raw = serde_json::to_string_pretty(&file).map_err(|e| Error::TokenStore {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(|e| token_error(path, &e))
    }
}

fn token_error(path: &Path, e: &std::io::Error) -> Error {
    Error::TokenStore {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
