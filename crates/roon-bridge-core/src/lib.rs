// roon-bridge-core: Pairing, zone state sync and command dispatch between
// gRPC callers and a Roon core.

pub mod bridge;
pub mod command;
pub mod config;
pub mod connector;
pub mod error;
pub mod pairing;
pub mod retry;
pub mod service;
pub mod store;
pub mod stream;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use command::requests::*;
pub use command::{Command, CommandResult, Target};
pub use config::{BridgeConfig, ConnectMode, ReconnectConfig, SupervisorConfig};
pub use connector::RoonConnector;
pub use error::{BridgeError, CoreError, ServiceError};
pub use pairing::PairingState;
pub use retry::RetryQueue;
pub use service::{BrowseApi, ImageApi, Session, StatusReporter, TransportApi, ZoneFeed};
pub use store::{ZoneCache, ZoneStore};
pub use stream::{SubscriberFanout, ZoneEvent, ZoneSubscription};
pub use supervisor::{ConnectionState, ConnectionSupervisor, Connector, Link};
