//! Chunked device writes
//!
//! spidev rejects transfers above its buffer size (4096 bytes by default on
//! most kernels), so frames go out in fixed-size pieces.

use std::io::{self, Write};

pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Write `bytes` in chunks of at most `chunk_size`. Returns the chunk count.
pub fn write_chunked<W: Write + ?Sized>(
    device: &mut W,
    bytes: &[u8],
    chunk_size: usize,
) -> io::Result<usize> {
    let mut chunks = 0;
    for chunk in bytes.chunks(chunk_size.max(1)) {
        device.write_all(chunk)?;
        chunks += 1;
    }
    Ok(chunks)
}
