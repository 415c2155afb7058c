//! Threaded frame pipeline
//!
//! Stages run on their own threads and are chained with bounded crossbeam
//! queues. The last stage feeds the frame pool's return queue, closing the
//! ring back to the source:
//!
//! ```text
//! source ──► [stage 0] ──► [stage 1] ──► ... ──► [sink] ──┐
//!    ▲                                                    │
//!    └──────────────────── FramePool ◄────────────────────┘
//! ```

use crate::error::{PipelineError, PipelineResult, StageError};
use crate::frame::FrameBuffer;
use crate::frame_pool::{FramePool, PoolStats};
use crate::stage::{run_stage, Stage, StageReport};
use crate::state::SharedState;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Pipeline tuning
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    /// Depth of each inter-stage queue. Defaults to the pool capacity, which
    /// is enough to hold every frame without blocking the tail.
    pub queue_depth: Option<usize>,
}

pub struct PipelineBuilder<S> {
    pool: Arc<FramePool>,
    state: SharedState<S>,
    stages: Vec<Box<dyn Stage<S>>>,
    config: PipelineConfig,
}

impl<S: Send + Sync + 'static> PipelineBuilder<S> {
    pub fn new(pool: Arc<FramePool>, state: SharedState<S>) -> Self {
        Self {
            pool,
            state,
            stages: Vec::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a stage. Frames visit stages in the order they are added.
    pub fn stage(mut self, stage: impl Stage<S> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn boxed_stage(mut self, stage: Box<dyn Stage<S>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Spawn one thread per stage and wire the queues
    pub fn build(self) -> PipelineResult<Pipeline<S>> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let depth = self
            .config
            .queue_depth
            .unwrap_or_else(|| self.pool.capacity())
            .max(1);
        let count = self.stages.len();
        let (input_tx, input_rx) = channel::bounded(depth);
        let mut receivers = Vec::with_capacity(count);
        let mut senders = Vec::with_capacity(count);
        receivers.push(input_rx);
        for _ in 1..count {
            let (tx, rx) = channel::bounded(depth);
            senders.push(tx);
            receivers.push(rx);
        }
        // Tail stage returns frames to the pool
        senders.push(self.pool.recycler());

        let (exit_tx, exit_rx) = channel::unbounded();
        let mut threads = Vec::with_capacity(count);

        let wiring = self.stages.into_iter().zip(receivers).zip(senders);
        for ((mut stage, input_rx), output_tx) in wiring {
            let name = stage.name().to_string();
            let state = self.state.clone();
            let exit_tx = exit_tx.clone();
            let thread_name = name.clone();

            let handle = thread::Builder::new()
                .name(format!("led-{}", name))
                .spawn(move || {
                    let result = run_stage(&mut stage, input_rx, output_tx, state);
                    let _ = exit_tx.send(thread_name);
                    result
                })?;

            threads.push(StageThread {
                name,
                handle: Some(handle),
            });
        }

        Ok(Pipeline {
            input: Some(input_tx),
            pool: self.pool,
            state: self.state,
            threads,
            exits: exit_rx,
            exited: None,
            submitted: 0,
        })
    }
}

struct StageThread {
    name: String,
    handle: Option<JoinHandle<Result<StageReport, StageError>>>,
}

/// A running pipeline, driven by the source that owns it
pub struct Pipeline<S> {
    input: Option<Sender<FrameBuffer>>,
    pool: Arc<FramePool>,
    state: SharedState<S>,
    threads: Vec<StageThread>,
    exits: Receiver<String>,
    exited: Option<String>,
    submitted: u64,
}

impl<S> Pipeline<S> {
    /// Wait for a recycled frame.
    ///
    /// Fails instead of blocking forever once any stage has exited, since
    /// frames held by a dead stage never come back.
    pub fn acquire(&mut self) -> PipelineResult<FrameBuffer> {
        if let Some(frame) = self.pool.try_acquire() {
            return Ok(frame);
        }
        if let Some(name) = &self.exited {
            return Err(PipelineError::StageExited(name.clone()));
        }

        select! {
            recv(self.pool.returns()) -> frame => match frame {
                Ok(frame) => Ok(self.pool.stamp(frame)),
                Err(_) => Err(PipelineError::Closed),
            },
            recv(self.exits) -> name => {
                let name = name.unwrap_or_default();
                log::warn!("stage '{}' exited while the source was waiting for a frame", name);
                self.exited = Some(name.clone());
                Err(PipelineError::StageExited(name))
            },
        }
    }

    /// Hand a frame to the first stage. Only frames from this pipeline's pool
    /// may be submitted, otherwise the return queue can overflow.
    pub fn submit(&mut self, frame: FrameBuffer) -> PipelineResult<()> {
        let input = self.input.as_ref().ok_or(PipelineError::Closed)?;
        input.send(frame).map_err(|_| PipelineError::Closed)?;
        self.submitted += 1;
        Ok(())
    }

    /// Control state shared with all stages
    pub fn state(&self) -> &SharedState<S> {
        &self.state
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted,
            stages: self.threads.len(),
            pool: self.pool.stats(),
        }
    }

    /// Close the input and wait for every stage to drain.
    ///
    /// Returns the per-stage reports, or the first fatal stage error.
    pub fn shutdown(&mut self) -> PipelineResult<Vec<StageReport>> {
        self.input.take();

        let mut reports = Vec::with_capacity(self.threads.len());
        let mut first_error = None;

        for thread in &mut self.threads {
            let Some(handle) = thread.handle.take() else {
                continue;
            };
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(source)) => {
                    first_error.get_or_insert(PipelineError::Stage {
                        stage: thread.name.clone(),
                        source,
                    });
                }
                Err(_) => {
                    first_error.get_or_insert(PipelineError::StagePanicked(thread.name.clone()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}

impl<S> Drop for Pipeline<S> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("pipeline shut down with error: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineStats {
    pub submitted: u64,
    pub stages: usize,
    pub pool: PoolStats,
}
