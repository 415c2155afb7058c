//! OPC wire format
//!
//! Every message is a 4-byte header followed by the payload:
//!
//! ```text
//! byte 0: channel      (0 = broadcast)
//! byte 1: command      (0 = set pixel colors)
//! byte 2: length high
//! byte 3: length low
//! ```

use crate::error::{OpcError, OpcResult};
use std::io::{self, Read};

pub const HEADER_LEN: usize = 4;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

pub const BROADCAST_CHANNEL: u8 = 0;
pub const SET_PIXEL_COLORS: u8 = 0;

/// Port OPC servers listen on by default
pub const DEFAULT_PORT: u16 = 7890;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcHeader {
    pub channel: u8,
    pub command: u8,
    pub length: u16,
}

impl OpcHeader {
    /// Header for a set-pixel-colors broadcast carrying `payload_len` bytes
    pub fn pixels(payload_len: usize) -> OpcResult<Self> {
        Self::new(BROADCAST_CHANNEL, SET_PIXEL_COLORS, payload_len)
    }

    pub fn new(channel: u8, command: u8, payload_len: usize) -> OpcResult<Self> {
        let length =
            u16::try_from(payload_len).map_err(|_| OpcError::PayloadTooLarge(payload_len))?;
        Ok(Self {
            channel,
            command,
            length,
        })
    }

    /// Length is sent high byte first
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let [high, low] = self.length.to_be_bytes();
        [self.channel, self.command, high, low]
    }

    pub fn decode(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            channel: bytes[0],
            command: bytes[1],
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn payload_len(&self) -> usize {
        self.length as usize
    }
}

/// One decoded OPC message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcMessage {
    pub channel: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl OpcMessage {
    pub fn header(&self) -> OpcResult<OpcHeader> {
        OpcHeader::new(self.channel, self.command, self.payload.len())
    }

    /// Header and payload as one contiguous buffer
    pub fn encode(&self) -> OpcResult<Vec<u8>> {
        let header = self.header()?;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

/// Read until `buf` is full or the stream ends. Returns bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read the next message from a stream.
///
/// Returns `Ok(None)` on a clean end of stream between messages. A stream
/// that ends inside a header or payload is a protocol violation.
pub fn read_message<R: Read + ?Sized>(reader: &mut R) -> OpcResult<Option<OpcMessage>> {
    let mut header = [0u8; HEADER_LEN];
    match read_full(reader, &mut header)? {
        0 => return Ok(None),
        HEADER_LEN => {}
        got => return Err(OpcError::ShortHeader { got }),
    }

    let header = OpcHeader::decode(header);
    let expected = header.payload_len();
    let mut payload = vec![0u8; expected];
    let got = read_full(reader, &mut payload)?;
    if got != expected {
        return Err(OpcError::ShortPayload { expected, got });
    }

    Ok(Some(OpcMessage {
        channel: header.channel,
        command: header.command,
        payload,
    }))
}
