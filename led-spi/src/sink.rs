//! SPI sink for LPD8806 strips
//!
//! Without the device there is nothing to drive, so failing to open it is a
//! startup error, and a failed write mid-frame stops the pipeline.

use crate::device::{write_chunked, DEFAULT_CHUNK_SIZE};
use crate::error::SpiError;
use crate::gamma::{GammaTable, LPD8806_GAMMA};
use crate::lpd8806::Lpd8806Encoder;
use led_pipeline::{FrameBuffer, Stage, StageContext, StageError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpiConfig {
    /// Largest single transfer handed to the device
    pub chunk_size: usize,
    /// Gamma exponent for the lookup table
    pub gamma: f64,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            gamma: LPD8806_GAMMA,
        }
    }
}

pub struct SpiSink<W> {
    device: W,
    label: String,
    encoder: Lpd8806Encoder,
    config: SpiConfig,
    frames: u64,
}

impl SpiSink<File> {
    /// Open a device node such as `/dev/spidev1.0`
    pub fn open(path: impl AsRef<Path>, config: SpiConfig) -> Result<Self, SpiError> {
        let path = path.as_ref();
        let device = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| SpiError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        log::info!("[spi] opened {}", path.display());
        Ok(Self::with_device(device, path.display().to_string(), config))
    }
}

impl<W: Write + Send> SpiSink<W> {
    pub fn with_device(device: W, label: impl Into<String>, config: SpiConfig) -> Self {
        let gamma = GammaTable::new(config.gamma);
        Self {
            device,
            label: label.into(),
            encoder: Lpd8806Encoder::new(&gamma),
            config,
            frames: 0,
        }
    }

    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    pub fn into_device(self) -> W {
        self.device
    }

    /// Encode and write one frame
    pub fn write_frame(&mut self, rgb: &[u8]) -> Result<usize, SpiError> {
        let bytes = self.encoder.encode(rgb);
        let total = bytes.len();
        let chunks = write_chunked(&mut self.device, bytes, self.config.chunk_size).map_err(
            |source| SpiError::Write {
                device: self.label.clone(),
                total,
                source,
            },
        )?;

        self.frames += 1;
        log::trace!("[spi] frame {}: {} bytes in {} chunks", self.frames, total, chunks);
        Ok(total)
    }
}

impl<S, W: Write + Send> Stage<S> for SpiSink<W> {
    fn name(&self) -> &str {
        "spi-lpd8806"
    }

    fn process(
        &mut self,
        frame: &mut FrameBuffer,
        _ctx: &StageContext<'_, S>,
    ) -> Result<(), StageError> {
        self.write_frame(frame.as_bytes())
            .map(|_| ())
            .map_err(|e| StageError::fatal_with("SPI bus write failed", e))
    }

    fn on_stop(&mut self) {
        if let Err(e) = self.device.flush() {
            log::warn!("[spi] flush on {} failed: {}", self.label, e);
        }
        log::info!("[spi] {} frames written to {}", self.frames, self.label);
    }
}
