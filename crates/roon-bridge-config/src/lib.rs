//! Layered settings for the Roon gRPC bridge.
//!
//! Serialized defaults, then a TOML file, then `ROON_BRIDGE_*` environment
//! variables. The binary merges its command-line flags on top and turns
//! the result into `roon_bridge_core` runtime configs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use roon_bridge_core::{BridgeConfig, ConnectMode, ReconnectConfig, SupervisorConfig};

const ENV_PREFIX: &str = "ROON_BRIDGE_";
const LOG_LEVELS: [&str; 7] = ["trace", "debug", "info", "warn", "error", "silent", "off"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Log verbosity for the Roon protocol client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoonLogLevel {
    #[default]
    None,
    Info,
    /// Every MOO message in and out.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// gRPC listen address, `host:port`.
    pub listen: String,

    /// Bridge log level: trace, debug, info, warn, error or silent.
    pub log_level: String,

    pub roon_log_level: RoonLogLevel,

    /// Where pairing tokens are kept. Defaults to the platform data dir.
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub roon: RoonSettings,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Zone events buffered per subscriber before it is dropped.
    pub subscriber_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:50051".into(),
            log_level: "info".into(),
            roon_log_level: RoonLogLevel::None,
            state_dir: default_state_dir(),
            roon: RoonSettings::default(),
            reconnect: ReconnectSettings::default(),
            discovery: DiscoverySettings::default(),
            subscriber_buffer: 256,
        }
    }
}

/// Direct connection to a known core, bypassing discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoonSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconnectSettings {
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Give up after this many consecutive failures. Unset retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5,
            max_delay_secs: 60,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoverySettings {
    pub timeout_secs: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self { timeout_secs: 3 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(invalid("listen", "must be host:port"));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(invalid(
                "log_level",
                format!("expected one of {}, got '{}'", LOG_LEVELS.join(", "), self.log_level),
            ));
        }
        match (&self.roon.host, self.roon.port) {
            (Some(_), Some(_)) | (None, None) => {}
            _ => {
                return Err(invalid(
                    "roon",
                    "host and port must be specified together",
                ));
            }
        }
        if self.roon.port == Some(0) {
            return Err(invalid("roon.port", "must be non-zero"));
        }
        if self.subscriber_buffer == 0 {
            return Err(invalid("subscriber_buffer", "must be at least 1"));
        }
        if self.reconnect.max_attempts == Some(0) {
            return Err(invalid("reconnect.max_attempts", "must be at least 1"));
        }
        if self.reconnect.initial_delay_secs > self.reconnect.max_delay_secs {
            return Err(invalid(
                "reconnect",
                "initial_delay_secs must not exceed max_delay_secs",
            ));
        }
        Ok(())
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            subscriber_buffer: self.subscriber_buffer,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        let connect = match (&self.roon.host, self.roon.port) {
            (Some(host), Some(port)) => ConnectMode::Direct {
                host: host.clone(),
                port,
            },
            _ => ConnectMode::Discover {
                timeout: Duration::from_secs(self.discovery.timeout_secs),
            },
        };
        SupervisorConfig {
            connect,
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_secs(self.reconnect.initial_delay_secs),
                max_delay: Duration::from_secs(self.reconnect.max_delay_secs),
                max_attempts: self.reconnect.max_attempts,
            },
            state_dir: self.state_dir.clone(),
            ..SupervisorConfig::default()
        }
    }

    /// The effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "roon-bridge", "roon-bridge")
}

/// Platform config file location, e.g. `~/.config/roon-bridge/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Platform data dir for pairing tokens.
pub fn default_state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults, then the TOML file, then the environment.
///
/// An explicit `path` must exist; the platform default may be absent.
pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

    match path {
        Some(path) if !path.exists() => {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            if let Some(default) = config_path() {
                figment = figment.merge(Toml::file(default));
            }
        }
    }

    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Extract and validate settings from a prepared figment.
pub fn extract(figment: &Figment) -> Result<Settings, ConfigError> {
    let settings: Settings = figment.extract()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings without command-line overrides.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    extract(&figment(path)?)
}

// ── Tests ───────────────────────────────────────────────────────────
