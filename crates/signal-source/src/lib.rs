//! Signal Source
//!
//! Provides lazily loaded audio signals and recursive WAV directory scanning.
//! Decode failures never escape a [`Signal`]: they surface as an empty signal.

mod scan;
mod signal;
mod wav;

pub use scan::{scan_directory, ScanOptions};
pub use signal::{Signal, SignalData};
pub use wav::decode_wav;

use std::path::PathBuf;
use thiserror::Error;

/// Errors while reading audio or scanning directories
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("WAV decode failed: {0}")]
    Decode(#[from] hound::Error),
    #[error("WAV file has no channels")]
    NoChannels,
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}
