// ── Runtime bridge configuration ──
//
// These types describe how to reach a core and how the bridge behaves once
// paired. They never touch disk: the binary builds them from its layered
// settings and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use roon_bridge_api::ExtensionInfo;

/// How to find the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectMode {
    /// SOOD multicast discovery; each round listens for `timeout`.
    Discover { timeout: Duration },
    /// Connect straight to a known `host:port`.
    Direct { host: String, port: u16 },
}

impl Default for ConnectMode {
    fn default() -> Self {
        Self::Discover {
            timeout: Duration::from_secs(3),
        }
    }
}

/// Backoff after a failed connect or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 5s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,
    /// Consecutive failures before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Everything the connection supervisor needs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub connect: ConnectMode,
    pub reconnect: ReconnectConfig,
    pub extension: ExtensionInfo,
    /// Directory holding `config.json` with pairing tokens. `None` keeps
    /// tokens in memory only.
    pub state_dir: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            connect: ConnectMode::default(),
            reconnect: ReconnectConfig::default(),
            extension: extension_info(),
            state_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Events buffered per zone subscriber before it is dropped.
    pub subscriber_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
        }
    }
}

/// The identity this bridge registers with.
pub fn extension_info() -> ExtensionInfo {
    ExtensionInfo {
        extension_id: "com.sambosley.grpc.roon".into(),
        display_name: "gRPC Bridge".into(),
        display_version: env!("CARGO_PKG_VERSION").into(),
        publisher: "Sam Bosley".into(),
        email: "sboz88@gmail.com".into(),
        website: Some("https://github.com/sbosley/roon-api-grpc-bridge".into()),
    }
}
