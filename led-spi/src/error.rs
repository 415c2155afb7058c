use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpiError {
    #[error("could not open SPI device {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing {total} bytes to SPI device {device} failed: {source}")]
    Write {
        device: String,
        total: usize,
        #[source]
        source: io::Error,
    },
}
