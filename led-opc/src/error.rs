//! OPC error types

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("payload of {0} bytes does not fit the 16-bit length field")]
    PayloadTooLarge(usize),

    #[error("short header: got {got} of 4 bytes")]
    ShortHeader { got: usize },

    #[error("short payload: expected {expected} bytes, got {got}")]
    ShortPayload { expected: usize, got: usize },

    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("connection {peer} failed: {source}")]
    Connection {
        peer: SocketAddr,
        #[source]
        source: Box<OpcError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl OpcError {
    /// True for framing errors that end a single connection
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, OpcError::ShortHeader { .. } | OpcError::ShortPayload { .. })
    }
}

pub type OpcResult<T> = std::result::Result<T, OpcError>;
