//! Featurize Pipeline
//!
//! Scans a directory of WAV files, extracts multi-resolution feature rows on
//! a worker pool and writes them as CSV or JSON lines.

use anyhow::{Context, Result};
use batch_scheduler::{BatchScheduler, BatchSummary, CsvSink, JsonLinesSink, RowSink};
use feature_engine::{builtin_registry, PerSignalLabeler};
use parking_lot::Mutex;
use signal_source::{scan_directory, Signal};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod cli;
pub mod config;

pub use crate::cli::Args;
pub use crate::config::{OutputConfig, OutputFormat, PipelineConfig};

/// Initialize logging to stderr; `RUST_LOG` takes precedence over `default_filter`
pub fn init_logging(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(io::stderr),
        )
        .init();
}

/// Extract every signal under `input` and write the rows configured by `config`
pub fn run(config: &PipelineConfig, input: &Path, cancel: &CancellationToken) -> Result<BatchSummary> {
    let signals = scan_directory(input, &config.scan)
        .with_context(|| format!("Failed to scan {}", input.display()))?;
    info!("Found {} signal(s) under {}", signals.len(), input.display());

    let registry = builtin_registry(&config.features).context("Invalid feature table")?;
    let mut scheduler: BatchScheduler<String> = BatchScheduler::new(
        config.scheduler.clone(),
        Arc::new(registry),
        config.engine.clone(),
    )?;
    if config.label_from_directory {
        scheduler = scheduler.with_labeler(Arc::new(PerSignalLabeler::parent_directory()));
    }

    let writer: Box<dyn Write + Send> = match &config.output.path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };

    let summary = match config.output.format {
        OutputFormat::Csv => emit(&scheduler, signals, CsvSink::new(writer), cancel)?,
        OutputFormat::JsonLines => emit(&scheduler, signals, JsonLinesSink::new(writer), cancel)?,
    };
    Ok(summary)
}

fn emit<S>(
    scheduler: &BatchScheduler<String>,
    signals: Vec<Signal>,
    sink: S,
    cancel: &CancellationToken,
) -> Result<BatchSummary>
where
    S: RowSink<String> + Send,
{
    let sink = Mutex::new(sink);
    let summary = scheduler.run(signals, &sink, cancel)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_tone(path: &Path, len: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..len {
            let t = i as f64 / 16000.0;
            let sample = (2.0 * std::f64::consts::PI * 440.0 * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f64) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (class, name) in [("speech", "a.wav"), ("speech", "b.wav"), ("music", "c.wav")] {
            let class_dir = dir.path().join(class);
            fs::create_dir_all(&class_dir).unwrap();
            write_tone(&class_dir.join(name), 1024);
        }
        dir
    }

    fn config(output: PathBuf, format: OutputFormat) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.engine.base_window = 256;
        config.scheduler.workers = 2;
        config.scheduler.batch_size = 2;
        config.output = OutputConfig {
            format,
            path: Some(output),
        };
        config.label_from_directory = true;
        config
    }

    #[test]
    fn test_csv_pipeline() {
        let input = corpus();
        let out = tempfile::tempdir().unwrap();
        let path = out.path().join("rows.csv");

        let summary = run(
            &config(path.clone(), OutputFormat::Csv),
            input.path(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(summary.signals, 3);
        assert!(summary.failures.is_empty());

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // 7 frames of 256 with shift 128 per 1024-sample file
        assert_eq!(lines.len(), 21);
        for line in &lines {
            let fields: Vec<&str> = line.split(',').collect();
            // id, position, label, mean, stddev, 20 MFCCs
            assert_eq!(fields.len(), 25);
            let expected = if fields[0].contains("/music/") { "music" } else { "speech" };
            assert_eq!(fields[2], expected);
        }
    }

    #[test]
    fn test_json_lines_pipeline() {
        let input = corpus();
        let out = tempfile::tempdir().unwrap();
        let path = out.path().join("rows.jsonl");

        run(
            &config(path.clone(), OutputFormat::JsonLines),
            input.path(),
            &CancellationToken::new(),
        )
        .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 21);
        assert!(text.lines().all(|l| l.starts_with('{') && l.contains("\"values\"")));
    }

    #[test]
    fn test_missing_input_directory() {
        let out = tempfile::tempdir().unwrap();
        let result = run(
            &config(out.path().join("rows.csv"), OutputFormat::Csv),
            Path::new("/nonexistent/clips"),
            &CancellationToken::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let input = corpus();
        let out = tempfile::tempdir().unwrap();
        let mut config = config(out.path().join("rows.csv"), OutputFormat::Csv);
        config.features.insert("zero_crossings".to_string(), vec![1]);

        assert!(run(&config, input.path(), &CancellationToken::new()).is_err());
    }
}
