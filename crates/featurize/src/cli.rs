//! Command-line Arguments

use crate::config::{OutputFormat, PipelineConfig};
use clap::Parser;
use std::path::PathBuf;

/// Extract multi-resolution feature rows from a directory of WAV files
#[derive(Parser, Debug)]
#[command(name = "featurize")]
#[command(version)]
pub struct Args {
    /// Directory to scan for audio files
    pub input: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "FEATURIZE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Row encoding
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Signals per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Base analysis window in samples
    #[arg(long)]
    pub window: Option<usize>,

    /// Label rows with each file's parent directory name
    #[arg(long)]
    pub label_from_dir: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Apply flags given on the command line on top of `config`
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.output {
            config.output.path = Some(path.clone());
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(workers) = self.workers {
            config.scheduler.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.scheduler.batch_size = batch_size;
        }
        if let Some(window) = self.window {
            config.engine.base_window = window;
        }
        if self.label_from_dir {
            config.label_from_directory = true;
        }
    }
}
