//! LPD8806 frame encoding
//!
//! Output layout for N pixels:
//! - `((3N + 31) / 32 + 2) * 5` zero bytes so the strip latches a new frame
//! - per pixel, (G, R, B), each byte `0x80 | (gamma(c) >> 1)`
//! - six `0x80` bytes to clock data through to the last LEDs

use crate::gamma::GammaTable;

/// Trailing bytes after the pixel data
pub const LATCH_LEN: usize = 6;

/// High bit is the chipset's framing bit; a latch byte is black
pub const LATCH_BYTE: u8 = 0x80;

/// Zero bytes sent before a frame of `byte_count` RGB bytes
#[inline]
pub fn preamble_len(byte_count: usize) -> usize {
    ((byte_count + 31) / 32 + 2) * 5
}

/// Keep the top seven bits and set the framing bit
#[inline]
pub fn pack(corrected: u8) -> u8 {
    0x80 | (corrected >> 1)
}

/// Total bytes on the wire for a frame of `byte_count` RGB bytes
pub fn encoded_len(byte_count: usize) -> usize {
    preamble_len(byte_count) + (byte_count / 3) * 3 + LATCH_LEN
}

/// Re-encodes RGB frames for the strip, reusing one output buffer
pub struct Lpd8806Encoder {
    /// gamma + pack per raw byte
    wire: [u8; 256],
    out: Vec<u8>,
}

impl Lpd8806Encoder {
    pub fn new(gamma: &GammaTable) -> Self {
        let mut wire = [0u8; 256];
        for (raw, slot) in wire.iter_mut().enumerate() {
            *slot = pack(gamma.lookup(raw as u8));
        }
        Self {
            wire,
            out: Vec::new(),
        }
    }

    /// Encode one frame. Trailing bytes that do not form a whole pixel are
    /// ignored.
    pub fn encode(&mut self, rgb: &[u8]) -> &[u8] {
        self.out.clear();
        self.out.reserve(encoded_len(rgb.len()));

        self.out.resize(preamble_len(rgb.len()), 0);

        for pixel in rgb.chunks_exact(3) {
            let (r, g, b) = (pixel[0], pixel[1], pixel[2]);
            self.out.extend_from_slice(&[
                self.wire[g as usize],
                self.wire[r as usize],
                self.wire[b as usize],
            ]);
        }

        self.out.extend_from_slice(&[LATCH_BYTE; LATCH_LEN]);
        &self.out
    }
}

impl Default for Lpd8806Encoder {
    fn default() -> Self {
        Self::new(&GammaTable::lpd8806())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_preamble_lengths() {
        assert_eq!(preamble_len(0), 10);
        assert_eq!(preamble_len(3), 15);
        assert_eq!(preamble_len(30), 15);
        assert_eq!(preamble_len(33), 20);
        assert_eq!(preamble_len(300), 60);
        assert_eq!(preamble_len(480), 85);

        for pixels in 1..400usize {
            let len = pixels * 3;
            assert_eq!(preamble_len(len), ((len + 31) / 32 + 2) * 5);
        }
    }

    #[test]
    fn test_pack_sets_framing_bit() {
        for c in 0..=255u8 {
            let packed = pack(c);
            assert_eq!(packed, 128 | (c >> 1));
            assert!(packed >= 128);
        }
        assert_eq!(pack(0), 128);
        assert_eq!(pack(255), 255);
    }

    #[test]
    fn test_frame_layout() {
        let gamma = GammaTable::lpd8806();
        let mut encoder = Lpd8806Encoder::new(&gamma);

        let out = encoder.encode(&[255, 0, 128]).to_vec();
        let preamble = preamble_len(3);

        assert_eq!(out.len(), encoded_len(3));
        assert!(out[..preamble].iter().all(|&b| b == 0));
        assert_eq!(
            &out[preamble..preamble + 3],
            &[pack(gamma.lookup(0)), pack(gamma.lookup(255)), pack(gamma.lookup(128))]
        );
        assert_eq!(&out[preamble..preamble + 2], &[128, 255]);
        assert_eq!(&out[preamble + 3..], &[LATCH_BYTE; LATCH_LEN]);
    }

    #[test]
    fn test_channel_swap_on_random_frames() {
        let gamma = GammaTable::lpd8806();
        let mut encoder = Lpd8806Encoder::new(&gamma);
        let mut rng = rand::thread_rng();

        for pixels in [1usize, 7, 160, 700] {
            let mut rgb = vec![0u8; pixels * 3];
            rng.fill(rgb.as_mut_slice());

            let out = encoder.encode(&rgb);
            let body = &out[preamble_len(rgb.len())..out.len() - LATCH_LEN];
            assert_eq!(body.len(), rgb.len());

            for (src, dst) in rgb.chunks_exact(3).zip(body.chunks_exact(3)) {
                let [r, g, b] = [src[0], src[1], src[2]].map(|c| pack(gamma.lookup(c)));
                assert_eq!(dst, &[g, r, b]);
            }
        }
    }

    #[test]
    fn test_partial_trailing_pixel_ignored() {
        let mut encoder = Lpd8806Encoder::default();
        let out = encoder.encode(&[0, 0, 0, 9, 9]).to_vec();
        assert_eq!(out.len(), preamble_len(5) + 3 + LATCH_LEN);
    }

    #[test]
    fn test_buffer_reused_between_frames() {
        let mut encoder = Lpd8806Encoder::default();
        let long = encoder.encode(&[0u8; 300]).len();
        let short = encoder.encode(&[0u8; 3]).len();
        assert_eq!(long, encoded_len(300));
        assert_eq!(short, encoded_len(3));
    }
}
