//! Stage abstraction and the per-stage run loop
//!
//! A stage reads one frame at a time from its input queue, does bounded
//! work on it, and forwards exactly one frame per frame read. It stops when
//! its input is closed and drained, or when nobody downstream is listening.

use crate::error::StageError;
use crate::frame::FrameBuffer;
use crate::state::SharedState;
use crossbeam::channel::{Receiver, Sender};

/// Context handed to [`Stage::process`] for one frame
pub struct StageContext<'a, S> {
    /// Snapshot of the shared control state taken before this frame
    pub state: &'a S,
    /// Frames this stage has processed before this one
    pub frame_index: u64,
}

/// A unit of concurrent work in the pipeline.
///
/// Sources, transforms and sinks all share this shape. Sinks perform their
/// side effects in `process` and leave the frame untouched.
pub trait Stage<S>: Send {
    /// Human-readable name, also used for the stage thread
    fn name(&self) -> &str;

    /// Called once on the stage thread before the first frame
    fn on_start(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Handle one frame. Returning an error stops the stage.
    fn process(&mut self, frame: &mut FrameBuffer, ctx: &StageContext<'_, S>)
        -> Result<(), StageError>;

    /// Called once after the last frame, whatever the reason for stopping
    fn on_stop(&mut self) {}
}

impl<S, T: Stage<S> + ?Sized> Stage<S> for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_start(&mut self) -> Result<(), StageError> {
        (**self).on_start()
    }

    fn process(
        &mut self,
        frame: &mut FrameBuffer,
        ctx: &StageContext<'_, S>,
    ) -> Result<(), StageError> {
        (**self).process(frame, ctx)
    }

    fn on_stop(&mut self) {
        (**self).on_stop()
    }
}

/// Stage built from a closure, handy for small transforms
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> FnStage<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<S, F> Stage<S> for FnStage<F>
where
    F: FnMut(&mut FrameBuffer, &S) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        frame: &mut FrameBuffer,
        ctx: &StageContext<'_, S>,
    ) -> Result<(), StageError> {
        (self.f)(frame, ctx.state);
        Ok(())
    }
}

/// Why a stage loop ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    /// Input queue closed and drained
    InputClosed,
    /// Downstream queue went away
    OutputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub frames: u64,
    pub exit: StageExit,
}

/// Drive `stage` until its input closes.
///
/// Frames are forwarded in the order they arrive. A fatal stage error drops
/// the frame in hand and ends the loop; every other frame is forwarded.
pub fn run_stage<S, T>(
    stage: &mut T,
    input: Receiver<FrameBuffer>,
    output: Sender<FrameBuffer>,
    state: SharedState<S>,
) -> Result<StageReport, StageError>
where
    T: Stage<S> + ?Sized,
{
    log::info!("[{}] starting up", stage.name());
    if let Err(e) = stage.on_start() {
        log::error!("[{}] failed to start: {}", stage.name(), e);
        return Err(e);
    }

    let mut frames = 0u64;
    let result = loop {
        let Ok(mut frame) = input.recv() else {
            break Ok(StageExit::InputClosed);
        };

        let snapshot = state.snapshot();
        let ctx = StageContext {
            state: &*snapshot,
            frame_index: frames,
        };
        if let Err(e) = stage.process(&mut frame, &ctx) {
            break Err(e);
        }
        frames += 1;

        if output.send(frame).is_err() {
            break Ok(StageExit::OutputClosed);
        }
    };

    stage.on_stop();

    match result {
        Ok(exit) => {
            log::info!("[{}] stopped after {} frames ({:?})", stage.name(), frames, exit);
            Ok(StageReport { frames, exit })
        }
        Err(e) => {
            log::error!("[{}] fatal: {}", stage.name(), e);
            Err(e)
        }
    }
}
