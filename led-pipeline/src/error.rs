//! Pipeline error types

use thiserror::Error;

/// Errors raised while building or driving a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("frame length {0} is not a whole number of RGB pixels")]
    PartialPixel(usize),

    #[error("pipeline needs at least one stage")]
    Empty,

    #[error("pipeline input is closed")]
    Closed,

    #[error("stage '{0}' exited")]
    StageExited(String),

    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("stage '{0}' panicked")]
    StagePanicked(String),

    #[error("failed to spawn stage thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors returned by a single stage while processing a frame
#[derive(Error, Debug)]
pub enum StageError {
    /// Unrecoverable failure; the stage stops and the pipeline reports it
    #[error("{message}")]
    Fatal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StageError {
    pub fn fatal(message: impl Into<String>) -> Self {
        StageError::Fatal {
            message: message.into(),
            source: None,
        }
    }

    pub fn fatal_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StageError::Fatal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
