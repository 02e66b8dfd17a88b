//! Batch Scheduler
//!
//! Fans feature extraction out over a fixed pool of worker threads. Each
//! worker owns its engine; rows reach the sink one whole batch at a time.

mod scheduler;
mod sink;

pub use scheduler::{BatchScheduler, BatchSummary, EngineFactory, SchedulerConfig, SignalFailure};
pub use sink::{CsvSink, JsonLinesSink, MemorySink, RowSink, SignalRows};

use feature_engine::GridError;
use thiserror::Error;

/// Errors writing rows to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Worker pool size must be positive")]
    InvalidPoolSize,
    #[error("Batch size must be positive")]
    InvalidBatchSize,
    #[error(transparent)]
    InvalidWindow(#[from] GridError),
    #[error("Sink failed: {0}")]
    Sink(#[from] SinkError),
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}
