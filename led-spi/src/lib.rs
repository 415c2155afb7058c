//! LPD8806 output over SPI
//!
//! Turns generic RGB frames into the byte stream LPD8806 strips expect:
//! - Gamma correction through a 256-entry lookup table
//! - GRB channel order with the framing bit set on every byte
//! - Zero preamble and latch tail sized to the strip
//! - Chunked writes below the spidev transfer limit

pub mod device;
pub mod error;
pub mod gamma;
pub mod lpd8806;
pub mod sink;

pub use device::*;
pub use error::*;
pub use gamma::*;
pub use lpd8806::*;
pub use sink::*;
