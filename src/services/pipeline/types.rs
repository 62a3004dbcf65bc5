//! Pipeline events and errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{PageDisposition, RunStatus};

/// Events emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Input discovered and cache index loaded.
    RunStarted { total: usize, cached: usize },
    /// A worker finished and its outcome reached the head of the queue.
    OcrCompleted {
        filename: String,
        candidate_page: Option<u32>,
    },
    /// A worker reported an error for this file.
    WorkerFailed { filename: String, error: String },
    /// Consumption is blocked waiting for a human decision.
    CorrectionRequested { filename: String },
    PageWritten {
        filename: String,
        disposition: PageDisposition,
        path: PathBuf,
    },
    PageCacheSkipped {
        filename: String,
        disposition: PageDisposition,
    },
    PageWriteFailed {
        filename: String,
        disposition: PageDisposition,
        error: String,
    },
    RunFinished { status: RunStatus },
}

/// Infrastructure failures that end a run before or outside page handling.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] crate::config::ConfigError),

    #[error("Worker pool failed: {0}")]
    WorkerPool(String),
}
