//! Lazily Loaded Signals

use crate::wav::decode_wav;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Decoded mono samples plus their sample rate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalData {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl SignalData {
    /// Wrap already decoded samples
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    Memory,
}

/// An audio signal whose samples are decoded on first access.
///
/// Loading happens at most once. A file that cannot be decoded yields an
/// empty signal with sample rate 0; the failure is logged, not returned.
pub struct Signal {
    id: String,
    origin: Origin,
    data: OnceLock<SignalData>,
}

impl Signal {
    /// Create a signal backed by a WAV file (not read until needed)
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: path.display().to_string(),
            origin: Origin::File(path),
            data: OnceLock::new(),
        }
    }

    /// Create an already loaded signal
    pub fn from_samples(id: impl Into<String>, samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            id: id.into(),
            origin: Origin::Memory,
            data: OnceLock::from(SignalData::new(samples, sample_rate)),
        }
    }

    /// Identifier used in output rows (the path for file-backed signals)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::File(path) => Some(path),
            Origin::Memory => None,
        }
    }

    /// Samples, loading them if necessary
    pub fn samples(&self) -> &[f64] {
        self.data().samples()
    }

    /// Sample rate, loading the signal if necessary
    pub fn sample_rate(&self) -> u32 {
        self.data().sample_rate()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the samples have been loaded yet
    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    fn data(&self) -> &SignalData {
        self.data.get_or_init(|| match &self.origin {
            Origin::File(path) => decode_wav(path).unwrap_or_else(|e| {
                warn!("Failed to load {}: {}; treating as empty", path.display(), e);
                SignalData::default()
            }),
            Origin::Memory => SignalData::default(),
        })
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
