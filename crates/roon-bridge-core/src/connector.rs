// ── Live connector ──
//
// Finds a core on the network (or uses a configured address), opens the
// MOO link, starts answering the core's ping and status requests, and
// registers the extension.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use roon_bridge_api::discovery::{self, DiscoveredCore};
use roon_bridge_api::extension::{register, serve_core_requests};
use roon_bridge_api::{CloseReason, MooConnection, StatusService, TokenStore};

use crate::config::{ConnectMode, SupervisorConfig};
use crate::error::CoreError;
use crate::service::Session;
use crate::supervisor::{Connector, Link};

pub struct RoonConnector {
    config: SupervisorConfig,
    status: StatusService,
    tokens: Mutex<TokenStore>,
}

impl RoonConnector {
    /// Load pairing tokens from the configured state dir and build a
    /// connector that serves `status` to every core it links with.
    pub fn new(config: SupervisorConfig, status: StatusService) -> Result<Self, CoreError> {
        let tokens = match &config.state_dir {
            Some(dir) => TokenStore::load(dir)?,
            None => TokenStore::in_memory(),
        };
        Ok(Self {
            config,
            status,
            tokens: Mutex::new(tokens),
        })
    }

    async fn resolve(&self) -> Result<Url, CoreError> {
        match &self.config.connect {
            ConnectMode::Direct { host, port } => Ok(discovery::websocket_url(host, *port)?),
            ConnectMode::Discover { timeout } => {
                debug!(timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX), "discovering cores");
                let cores = discovery::discover(*timeout).await?;
                let paired = self.tokens.lock().await.paired_core_id().map(str::to_owned);
                let core = pick_core(cores, paired.as_deref()).ok_or(CoreError::NoCoreFound)?;
                info!(
                    unique_id = %core.unique_id,
                    name = core.display_name.as_deref().unwrap_or("?"),
                    addr = %core.addr,
                    "found core"
                );
                Ok(core.websocket_url()?)
            }
        }
    }
}

/// The previously paired core if it answered, else the first to answer.
fn pick_core(cores: Vec<DiscoveredCore>, paired_core_id: Option<&str>) -> Option<DiscoveredCore> {
    let preferred = paired_core_id.and_then(|id| cores.iter().position(|c| c.unique_id == id));
    cores.into_iter().nth(preferred.unwrap_or(0))
}

#[async_trait]
impl Connector for RoonConnector {
    async fn establish(&self) -> Result<Box<dyn Link>, CoreError> {
        let url = self.resolve().await?;
        info!(%url, "connecting to core");
        let (conn, inbound) = MooConnection::connect(&url).await?;
        tokio::spawn(serve_core_requests(conn.clone(), inbound, self.status.clone()));

        let mut tokens = self.tokens.lock().await;
        let core = match register(&conn, &self.config.extension, &mut tokens).await {
            Ok(core) => core,
            Err(e) => {
                conn.close();
                return Err(e.into());
            }
        };
        drop(tokens);

        let session = Session::from_connection(core, &conn);
        Ok(Box::new(RoonLink { conn, session }))
    }
}

struct RoonLink {
    conn: MooConnection,
    session: Session,
}

#[async_trait]
impl Link for RoonLink {
    fn session(&self) -> Session {
        self.session.clone()
    }

    async fn closed(&self) -> CloseReason {
        self.conn.closed().await
    }

    fn close(&self) {
        self.conn.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use pretty_assertions::assert_eq;

    use super::*;

    fn core(id: &str) -> DiscoveredCore {
        DiscoveredCore {
            unique_id: id.into(),
            display_name: None,
            addr: "10.0.0.2:9330".parse::<SocketAddr>().unwrap(),
        }
    }

    #[test]
    fn previously_paired_core_is_preferred() {
        let picked = pick_core(vec![core("a"), core("b")], Some("b")).unwrap();
        assert_eq!(picked.unique_id, "b");
    }

    #[test]
    fn first_core_wins_without_a_pairing() {
        assert_eq!(pick_core(vec![core("a"), core("b")], None).unwrap().unique_id, "a");
        assert_eq!(pick_core(vec![core("a")], Some("gone")).unwrap().unique_id, "a");
        assert!(pick_core(Vec::new(), None).is_none());
    }

    #[test]
    fn unreadable_token_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("config.json")).unwrap();

        let config = SupervisorConfig {
            state_dir: Some(dir.path().to_path_buf()),
            ..SupervisorConfig::default()
        };
        let result = RoonConnector::new(config, StatusService::new("Pairing...", false));

        assert!(matches!(result, Err(CoreError::State { .. })));
    }
}
