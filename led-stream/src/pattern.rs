//! Built-in test pattern
//!
//! Moving red, green and blue triangle waves with different periods, so every
//! channel sweeps its full range. The first 32 pixels are monochrome, which
//! makes gamma problems easy to spot.

use led_pipeline::FrameBuffer;
use std::time::Duration;

const MONOCHROME_PIXELS: usize = 32;

/// (speed in pixels per second, period in pixels) per channel
const WAVES: [(f64, f64); 3] = [(2.84, 16.0), (4.00, 19.0), (5.37, 27.0)];

/// Modulo that is never negative
fn pos_mod(x: f64, m: f64) -> f64 {
    ((x % m) + m) % m
}

/// Map [0, 1] to a byte, clamping out-of-range values
fn unit_to_byte(x: f64) -> u8 {
    (x * 256.0).clamp(0.0, 255.0) as u8
}

/// Triangle wave in [0, 1] for pixel `index` at time `t`
fn triangle(index: usize, t: f64, (speed, period): (f64, f64)) -> f64 {
    let saw = pos_mod(index as f64 - t * speed, period) / (period - 1.0);
    (saw * 2.0 - 1.0).abs()
}

#[derive(Debug, Default)]
pub struct TestPattern;

impl TestPattern {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut FrameBuffer, elapsed: Duration) {
        let t = elapsed.as_secs_f64();

        for (i, pixel) in frame.pixels_mut().iter_mut().enumerate() {
            let r = triangle(i, t, WAVES[0]);
            let (g, b) = if i < MONOCHROME_PIXELS {
                (r, r)
            } else {
                (triangle(i, t, WAVES[1]), triangle(i, t, WAVES[2]))
            };
            *pixel = [unit_to_byte(r), unit_to_byte(g), unit_to_byte(b)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_mod() {
        assert_eq!(pos_mod(-1.0, 16.0), 15.0);
        assert_eq!(pos_mod(17.0, 16.0), 1.0);
    }

    #[test]
    fn test_unit_to_byte_clamps() {
        assert_eq!(unit_to_byte(-0.5), 0);
        assert_eq!(unit_to_byte(0.5), 128);
        assert_eq!(unit_to_byte(1.0), 255);
    }

    #[test]
    fn test_monochrome_head() {
        let mut frame = FrameBuffer::new(40);
        TestPattern::new().render(&mut frame, Duration::from_millis(1234));

        for pixel in &frame.pixels()[..MONOCHROME_PIXELS] {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[0], pixel[2]);
        }
    }

    #[test]
    fn test_pattern_moves() {
        let pattern = TestPattern::new();
        let mut a = FrameBuffer::new(64);
        let mut b = FrameBuffer::new(64);
        pattern.render(&mut a, Duration::ZERO);
        pattern.render(&mut b, Duration::from_millis(500));
        assert_ne!(a.checksum(), b.checksum());
    }
}
