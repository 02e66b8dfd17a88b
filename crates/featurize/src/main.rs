//! Featurize - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use featurize::{init_logging, run, Args, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("=== Featurize v{} ===", env!("CARGO_PKG_VERSION"));

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    info!(
        "Engine: base_window={}, cache_capacity={}; scheduler: workers={}, batch_size={}",
        config.engine.base_window,
        config.engine.cache_capacity,
        config.scheduler.workers,
        config.scheduler.batch_size
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing current frames");
            ctrl_c.cancel();
        }
    });

    let input = args.input.clone();
    let summary = tokio::task::spawn_blocking(move || run(&config, &input, &cancel))
        .await
        .context("Extraction task failed")??;

    for failure in &summary.failures {
        warn!("{}: {}", failure.signal_id, failure.error);
    }
    info!(
        "Wrote {} row(s) from {} signal(s) in {} batch(es)",
        summary.rows, summary.signals, summary.batches
    );
    if summary.cancelled {
        anyhow::bail!("extraction cancelled");
    }
    Ok(())
}
