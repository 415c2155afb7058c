//! Open Pixel Control (OPC) transport
//!
//! Length-prefixed pixel messages over TCP:
//! - `wire`: header codec and stream framing
//! - `client`: pipeline sink with reconnect-on-failure
//! - `server`: listener publishing inbound messages on a queue

pub mod client;
pub mod error;
pub mod server;
pub mod wire;

pub use client::*;
pub use error::*;
pub use server::*;
pub use wire::*;
