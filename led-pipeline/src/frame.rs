//! Frame data types

use crate::error::PipelineError;
use std::fmt;

/// Bytes per pixel in every frame (R, G, B)
pub const BYTES_PER_PIXEL: usize = 3;

/// One frame of pixel data in `[r g b  r g b ...]` order.
///
/// A frame is owned by exactly one stage at a time. Ownership moves with the
/// value through the pipeline queues and back to the pool, so no two stages
/// can ever hold the same buffer.
pub struct FrameBuffer {
    data: Vec<u8>,
    sequence: u64,
}

impl FrameBuffer {
    /// Create a black frame for `pixel_count` pixels
    pub fn new(pixel_count: usize) -> Self {
        Self {
            data: vec![0u8; pixel_count * BYTES_PER_PIXEL],
            sequence: 0,
        }
    }

    /// Wrap existing RGB bytes. The length must be a whole number of pixels.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        if bytes.len() % BYTES_PER_PIXEL != 0 {
            return Err(PipelineError::PartialPixel(bytes.len()));
        }
        Ok(Self {
            data: bytes,
            sequence: 0,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / BYTES_PER_PIXEL
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// View the frame as RGB triples
    pub fn pixels(&self) -> &[[u8; 3]] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn pixels_mut(&mut self) -> &mut [[u8; 3]] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Set every pixel to the same color
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for pixel in self.pixels_mut() {
            *pixel = rgb;
        }
    }

    /// Copy as much of `src` as fits, leaving the remainder untouched
    pub fn copy_from(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.data.len());
        self.data[..n].copy_from_slice(&src[..n]);
        n
    }

    /// Number stamped by the pool each time the frame is handed out
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// FNV-1a hash of the pixel bytes
    pub fn checksum(&self) -> u64 {
        self.data.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, &b| {
            (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("pixels", &self.pixel_count())
            .field("sequence", &self.sequence)
            .finish()
    }
}
