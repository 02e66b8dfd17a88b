//! Recursive WAV Discovery

use crate::{Signal, SourceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory scan options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// File extension to accept (case-insensitive, without the dot)
    pub extension: String,
    /// Follow symbolic links while walking
    pub follow_links: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extension: "wav".to_string(),
            follow_links: false,
            max_depth: None,
        }
    }
}

/// Recursively collect matching files under `root` as lazily loaded signals.
///
/// Signals are returned sorted by path. Unreadable entries are skipped with a
/// warning; files are not opened here.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Vec<Signal>, SourceError> {
    if !root.exists() {
        return Err(SourceError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(SourceError::NotADirectory(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .max_depth(options.max_depth.unwrap_or(usize::MAX))
        .sort_by_file_name();

    let mut signals = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && has_extension(entry.path(), &options.extension) {
                    signals.push(Signal::from_path(entry.path()));
                }
            }
            Err(e) => {
                warn!("Error accessing entry: {}", e);
            }
        }
    }

    debug!("Discovered {} signal(s) under {}", signals.len(), root.display());
    Ok(signals)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
