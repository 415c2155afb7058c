//! LED frame pipeline
//!
//! Streams per-pixel RGB frames through a chain of threaded stages.
//!
//! Key properties:
//! - One thread per stage, bounded crossbeam queues between them
//! - Fixed frame pool with a return queue (no steady-state allocation)
//! - Single owner per frame, enforced by moving `FrameBuffer` values
//! - Read-only control state snapshots swapped between frames

pub mod clock;
pub mod error;
pub mod frame;
pub mod frame_pool;
pub mod pipeline;
pub mod sinks;
pub mod stage;
pub mod state;

pub use clock::*;
pub use error::*;
pub use frame::*;
pub use frame_pool::*;
pub use pipeline::*;
pub use sinks::*;
pub use stage::*;
pub use state::*;
