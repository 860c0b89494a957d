//! Generated `roon.v1` messages, client and server.

#![allow(
    dead_code,
    clippy::all,
    clippy::pedantic,
    clippy::as_conversions,
    clippy::unwrap_used
)]

tonic::include_proto!("roon.v1");
