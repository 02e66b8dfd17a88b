//! Extraction Error Types

use crate::timegrid::TimeSpec;
use thiserror::Error;

/// Invalid window or shift configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Invalid window configuration: {0}")]
    InvalidWindowConfig(String),
}

/// Errors from the DSP backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DspError {
    #[error("Buffer is empty")]
    EmptyBuffer,
    #[error("Window of {0} samples is too short")]
    WindowTooShort(usize),
    #[error("Buffer length {actual} does not match filterbank window {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Invalid filterbank: {0}")]
    InvalidFilterbank(String),
}

/// Errors during feature registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Feature already registered: {0}")]
    DuplicateFeature(String),
    #[error("Feature {0} has no resolution factors")]
    NoFactors(String),
    #[error("Feature {0} has a zero resolution factor")]
    ZeroFactor(String),
    #[error("Unknown built-in feature: {0}")]
    UnknownBuiltin(String),
}

/// Failure of a single feature computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Feature not registered: {0}")]
    UnknownFeature(String),
    #[error("No spectrum cached at {0}")]
    MissingSpectrum(TimeSpec),
    #[error("No samples cached at {0}")]
    MissingSamples(TimeSpec),
    #[error("DSP error: {0}")]
    Dsp(#[from] DspError),
    #[error("{0}")]
    Compute(String),
}

/// Label stream contract violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("Label span {index} starts at {start}, not after previous start {previous}")]
    UnsortedLabels {
        index: usize,
        previous: usize,
        start: usize,
    },
    #[error("Query position {position} precedes previous query {previous}")]
    NonMonotonicQuery { previous: usize, position: usize },
}

/// Errors returned by a full extraction call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    InvalidWindowConfig(#[from] GridError),
    #[error("Feature {feature} failed at {tspec}: {source}")]
    FeatureCompute {
        feature: String,
        tspec: TimeSpec,
        #[source]
        source: FeatureError,
    },
    #[error("Spectrum failed at {tspec}: {source}")]
    Spectrum {
        tspec: TimeSpec,
        #[source]
        source: DspError,
    },
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error("Extraction cancelled")]
    Cancelled,
}
