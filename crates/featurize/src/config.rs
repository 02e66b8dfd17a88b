//! Pipeline Configuration

use anyhow::{Context, Result};
use batch_scheduler::SchedulerConfig;
use feature_engine::{default_features, EngineConfig};
use serde::{Deserialize, Serialize};
use signal_source::ScanOptions;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `FEATURIZE_SCHEDULER__WORKERS=8`
pub const ENV_PREFIX: &str = "FEATURIZE";

/// Row encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    JsonLines,
}

/// Where rows go
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Output file (None = stdout)
    pub path: Option<PathBuf>,
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    /// Feature name -> resolution factors
    pub features: BTreeMap<String, Vec<usize>>,
    pub scheduler: SchedulerConfig,
    pub scan: ScanOptions,
    pub output: OutputConfig,
    /// Label every file with its parent directory's name
    pub label_from_directory: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            features: default_features(),
            scheduler: SchedulerConfig::default(),
            scan: ScanOptions::default(),
            output: OutputConfig::default(),
            label_from_directory: false,
        }
    }
}

impl PipelineConfig {
    /// Load defaults, then `path` (if any), then `FEATURIZE_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Like [`load`](Self::load) with an explicit environment instead of the process's
    pub fn load_from(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(config)
    }
}
