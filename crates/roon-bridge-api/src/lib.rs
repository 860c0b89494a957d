// roon-bridge-api: Async Rust client for the Roon extension protocol

pub mod connection;
pub mod discovery;
pub mod error;
pub mod extension;
pub mod models;
pub mod moo;
pub mod services;

pub use connection::{CloseReason, InboundRequests, MooConnection};
pub use error::Error;
pub use extension::{CoreInfo, ExtensionInfo, TokenStore};
pub use services::{BrowseClient, ImageClient, StatusService, TransportClient};
