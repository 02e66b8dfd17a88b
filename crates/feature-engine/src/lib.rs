//! Feature Extraction Engine
//!
//! Computes registered features at several window resolutions, memoized per
//! [`TimeSpec`], and merges them into one row per position of the finest grid.

mod dsp;
mod engine;
mod error;
mod features;
mod labels;
mod registry;
mod statistics;
mod timegrid;

pub use dsp::{DspBackend, Filterbank, FilterbankSpec, SpectrumAnalyzer, SpectrumOptions};
pub use engine::{EngineConfig, ExtractionEngine, FeatureRow};
pub use error::{
    DspError, ExtractionError, FeatureError, GridError, LabelError, RegistryError,
};
pub use features::{builtin_registry, default_features, register_builtin, BUILTIN_FEATURES};
pub use labels::{LabelAligner, LabelSpan, Labeler, PerSignalLabeler};
pub use registry::{
    ComputeFn, FeatureCache, FeatureDescriptor, FeatureRegistry, FeatureValue, Memoized,
};
pub use timegrid::{map_index, Frames, Resolution, TimeGrid, TimeSpec};
