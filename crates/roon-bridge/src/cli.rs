//! Clap derive structures for the `roon-bridge` binary.
//!
//! Every flag is optional: unset flags fall through to the environment, the
//! config file and finally the built-in defaults.

use std::path::PathBuf;

use clap::Parser;
use figment::Figment;
use figment::providers::Serialized;
use serde::Serialize;

use roon_bridge_config::{ConfigError, Settings};

/// roon-bridge -- expose a Roon core over gRPC
#[derive(Debug, Parser)]
#[command(
    name = "roon-bridge",
    version,
    about = "Expose a Roon core's transport, browse and image APIs over gRPC",
    long_about = "Runs as a Roon extension and serves the roon.v1.RoonService gRPC API.\n\n\
        The core is found by UDP discovery unless --roon-host and --roon-port\n\
        are given. Enable the extension under Settings > Extensions in Roon."
)]
pub struct Cli {
    /// Address the gRPC server listens on
    #[arg(long = "host", short = 'H', value_name = "HOST:PORT", env = "ROON_BRIDGE_LISTEN")]
    pub listen: Option<String>,

    /// Bridge log level
    #[arg(
        long,
        short = 'l',
        env = "ROON_BRIDGE_LOG_LEVEL",
        value_parser = ["trace", "debug", "info", "warn", "error", "silent"]
    )]
    pub log_level: Option<String>,

    /// Roon protocol client log level
    #[arg(
        long,
        env = "ROON_BRIDGE_ROON_LOG_LEVEL",
        value_parser = ["none", "info", "all"]
    )]
    pub roon_log_level: Option<String>,

    /// Directory holding the extension's pairing state
    #[arg(long = "root", short = 'r', value_name = "DIR", env = "ROON_BRIDGE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Connect to this core host instead of discovering one
    #[arg(long, requires = "roon_port")]
    pub roon_host: Option<String>,

    /// Port of the core given by --roon-host
    #[arg(long, requires = "roon_host")]
    pub roon_port: Option<u16>,

    /// Exit after this many consecutive failed connection attempts
    #[arg(long, value_name = "N")]
    pub max_connect_attempts: Option<u32>,

    /// Config file (default: platform config dir)
    #[arg(long, short = 'c', value_name = "FILE", env = "ROON_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

// ── Settings overrides ───────────────────────────────────────────────

/// Flags that were set, shaped like `Settings` so figment can merge them.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    listen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roon_log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_dir: Option<PathBuf>,
    roon: RoonOverrides,
    reconnect: ReconnectOverrides,
}

#[derive(Debug, Default, Serialize)]
struct RoonOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}

#[derive(Debug, Default, Serialize)]
struct ReconnectOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attempts: Option<u32>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            listen: self.listen.clone(),
            log_level: self.log_level.clone(),
            roon_log_level: self.roon_log_level.clone(),
            state_dir: self.state_dir.clone(),
            roon: RoonOverrides {
                host: self.roon_host.clone(),
                port: self.roon_port,
            },
            reconnect: ReconnectOverrides {
                max_attempts: self.max_connect_attempts,
            },
        }
    }

    /// Defaults, config file and environment, with these flags on top.
    pub fn figment(&self) -> Result<Figment, ConfigError> {
        let base = roon_bridge_config::figment(self.config.as_deref())?;
        Ok(base.merge(Serialized::defaults(self.overrides())))
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        roon_bridge_config::extract(&self.figment()?)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
