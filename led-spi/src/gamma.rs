//! Gamma correction lookup table

/// Exponent the LPD8806 strips are tuned for
pub const LPD8806_GAMMA: f64 = 2.2;

/// Raw intensity to corrected intensity, precomputed for every byte value.
///
/// `corrected = round(256 * (raw / 255) ^ gamma)`, clamped to 255. The table
/// is monotonically non-decreasing for any positive exponent.
#[derive(Clone)]
pub struct GammaTable {
    table: [u8; 256],
    exponent: f64,
}

impl GammaTable {
    pub fn new(exponent: f64) -> Self {
        let mut table = [0u8; 256];
        for (raw, slot) in table.iter_mut().enumerate() {
            let corrected = (256.0 * (raw as f64 / 255.0).powf(exponent)).round();
            *slot = corrected.clamp(0.0, 255.0) as u8;
        }
        Self { table, exponent }
    }

    pub fn lpd8806() -> Self {
        Self::new(LPD8806_GAMMA)
    }

    #[inline]
    pub fn lookup(&self, raw: u8) -> u8 {
        self.table[raw as usize]
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    pub fn as_slice(&self) -> &[u8; 256] {
        &self.table
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::lpd8806()
    }
}

impl std::fmt::Debug for GammaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GammaTable").field("exponent", &self.exponent).finish()
    }
}
