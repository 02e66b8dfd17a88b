//! Batch Scheduler Implementation

use crate::sink::{RowSink, SignalRows};
use crate::SchedulerError;
use crossbeam_channel::Receiver;
use feature_engine::{
    EngineConfig, ExtractionEngine, ExtractionError, FeatureRegistry, Labeler, TimeGrid,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use signal_source::Signal;
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Builds one engine per worker
pub type EngineFactory = Arc<dyn Fn() -> ExtractionEngine + Send + Sync>;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Signals per batch
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 8,
        }
    }
}

/// A signal whose rows were dropped
#[derive(Debug, Clone)]
pub struct SignalFailure {
    pub signal_id: String,
    pub error: ExtractionError,
}

/// Outcome of a run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Batches written to the sink
    pub batches: usize,
    /// Signals whose rows were written
    pub signals: usize,
    /// Rows written
    pub rows: usize,
    /// Signals dropped because extraction or labelling failed
    pub failures: Vec<SignalFailure>,
    /// Whether the run stopped early
    pub cancelled: bool,
}

impl BatchSummary {
    fn merge(&mut self, other: BatchSummary) {
        self.batches += other.batches;
        self.signals += other.signals;
        self.rows += other.rows;
        self.failures.extend(other.failures);
        self.cancelled |= other.cancelled;
    }
}

struct Batch {
    index: usize,
    signals: Vec<Signal>,
}

/// Splits signals into fixed-size batches and extracts them on a worker pool
pub struct BatchScheduler<L> {
    config: SchedulerConfig,
    min_window: usize,
    factory: EngineFactory,
    labeler: Option<Arc<dyn Labeler<L>>>,
}

impl<L: Clone> BatchScheduler<L> {
    /// Create a scheduler whose workers run [`ExtractionEngine::with_config`].
    ///
    /// Pool size, batch size and the window grid are validated here, before
    /// any signal is touched.
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<FeatureRegistry>,
        engine_config: EngineConfig,
    ) -> Result<Self, SchedulerError> {
        TimeGrid::new(engine_config.base_window, registry.factors())?;
        let min_window = engine_config.base_window;
        let factory: EngineFactory = Arc::new(move || {
            ExtractionEngine::with_config(Arc::clone(&registry), engine_config.clone())
        });
        Self::with_engine_factory(config, min_window, factory)
    }

    /// Create a scheduler with a custom engine factory
    pub fn with_engine_factory(
        config: SchedulerConfig,
        min_window: usize,
        factory: EngineFactory,
    ) -> Result<Self, SchedulerError> {
        if config.workers == 0 {
            return Err(SchedulerError::InvalidPoolSize);
        }
        if config.batch_size == 0 {
            return Err(SchedulerError::InvalidBatchSize);
        }

        info!(
            "Creating batch scheduler: workers={}, batch_size={}, min_window={}",
            config.workers, config.batch_size, min_window
        );
        Ok(Self {
            config,
            min_window,
            factory,
            labeler: None,
        })
    }

    /// Attach labels from `labeler` to every row
    pub fn with_labeler(mut self, labeler: Arc<dyn Labeler<L>>) -> Self {
        self.labeler = Some(labeler);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Extract every signal and emit rows to `sink`, one batch per lock.
    ///
    /// Within a batch, rows follow input order; batches reach the sink in
    /// completion order.
    pub fn run<S>(
        &self,
        signals: Vec<Signal>,
        sink: &Mutex<S>,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, SchedulerError>
    where
        S: RowSink<L> + Send,
    {
        let batches = self.partition(signals);
        let batch_count = batches.len();
        let workers = self.config.workers.min(batch_count).max(1);
        info!("Starting {} batch(es) on {} worker(s)", batch_count, workers);

        let (tx, rx) = crossbeam_channel::unbounded();
        for batch in batches {
            if tx.send(batch).is_err() {
                break;
            }
        }
        drop(tx);

        // Sink failures stop the other workers without cancelling the caller's token
        let run_token = cancel.child_token();
        let outcomes: Vec<(usize, thread::Result<Result<BatchSummary, SchedulerError>>)> =
            thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|id| {
                        let rx = rx.clone();
                        let token = run_token.clone();
                        (id, scope.spawn(move || self.work(id, rx, sink, token)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(id, handle)| (id, handle.join()))
                    .collect()
            });

        let mut summary = BatchSummary::default();
        let mut first_error = None;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(Ok(worker_summary)) => summary.merge(worker_summary),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(SchedulerError::WorkerPanicked(id));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        sink.lock().flush()?;
        info!(
            "Run finished: {} signal(s), {} row(s), {} failure(s){}",
            summary.signals,
            summary.rows,
            summary.failures.len(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }

    fn partition(&self, signals: Vec<Signal>) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current = Vec::with_capacity(self.config.batch_size);
        for signal in signals {
            current.push(signal);
            if current.len() == self.config.batch_size {
                batches.push(Batch {
                    index: batches.len(),
                    signals: std::mem::take(&mut current),
                });
            }
        }
        if !current.is_empty() {
            batches.push(Batch {
                index: batches.len(),
                signals: current,
            });
        }
        batches
    }

    fn work<S>(
        &self,
        id: usize,
        batches: Receiver<Batch>,
        sink: &Mutex<S>,
        token: CancellationToken,
    ) -> Result<BatchSummary, SchedulerError>
    where
        S: RowSink<L>,
    {
        let mut engine = (self.factory)().with_cancellation(token.clone());
        let mut summary = BatchSummary::default();

        for batch in batches.iter() {
            if token.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let mut output = Vec::with_capacity(batch.signals.len());
            for signal in &batch.signals {
                match engine.labeled_features(signal, self.min_window, self.labeler.as_deref()) {
                    Ok(rows) => output.push(SignalRows {
                        signal_id: signal.id().to_string(),
                        rows,
                    }),
                    Err(ExtractionError::Cancelled) => {
                        debug!("Worker {} dropping batch {} on cancellation", id, batch.index);
                        summary.cancelled = true;
                        return Ok(summary);
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", signal.id(), e);
                        summary.failures.push(SignalFailure {
                            signal_id: signal.id().to_string(),
                            error: e,
                        });
                    }
                }
            }

            let rows: usize = output.iter().map(|s| s.rows.len()).sum();
            {
                let mut sink = sink.lock();
                if let Err(e) = sink.emit_batch(&output) {
                    token.cancel();
                    return Err(e.into());
                }
            }

            summary.batches += 1;
            summary.signals += output.len();
            summary.rows += rows;
            debug!(
                "Worker {} emitted batch {}: {} signal(s), {} row(s)",
                id,
                batch.index,
                output.len(),
                rows
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::SinkError;
    use feature_engine::{builtin_registry, default_features, FeatureError, FeatureValue, PerSignalLabeler};
    use std::collections::BTreeMap;

    fn signals(count: usize) -> Vec<Signal> {
        (0..count)
            .map(|n| {
                let len = 200 + n * 97;
                let samples = (0..len)
                    .map(|i| ((i * (n + 3)) as f64 * 0.05).sin())
                    .collect();
                Signal::from_samples(format!("signal-{:02}", n), samples, 8000)
            })
            .collect()
    }

    fn scheduler(workers: usize, batch_size: usize) -> BatchScheduler<String> {
        let mut features = default_features();
        features.insert("mean".to_string(), vec![1, 2]);
        let registry = Arc::new(builtin_registry(&features).unwrap());
        let engine_config = EngineConfig {
            base_window: 32,
            ..EngineConfig::default()
        };
        BatchScheduler::new(
            SchedulerConfig {
                workers,
                batch_size,
            },
            registry,
            engine_config,
        )
        .unwrap()
    }

    fn rows_by_signal(sink: MemorySink<String>) -> BTreeMap<String, Vec<feature_engine::FeatureRow>> {
        sink.into_batches()
            .into_iter()
            .flatten()
            .map(|s| (s.signal_id, s.rows))
            .collect()
    }

    #[test]
    fn test_config_validation() {
        let registry = Arc::new(builtin_registry(&default_features()).unwrap());
        let bad_pool = BatchScheduler::<String>::new(
            SchedulerConfig { workers: 0, batch_size: 1 },
            Arc::clone(&registry),
            EngineConfig::default(),
        );
        assert!(matches!(bad_pool, Err(SchedulerError::InvalidPoolSize)));

        let bad_batch = BatchScheduler::<String>::new(
            SchedulerConfig { workers: 1, batch_size: 0 },
            Arc::clone(&registry),
            EngineConfig::default(),
        );
        assert!(matches!(bad_batch, Err(SchedulerError::InvalidBatchSize)));

        let bad_window = BatchScheduler::<String>::new(
            SchedulerConfig::default(),
            registry,
            EngineConfig { base_window: 1, ..EngineConfig::default() },
        );
        assert!(matches!(bad_window, Err(SchedulerError::InvalidWindow(_))));
    }

    #[test]
    fn test_pool_size_does_not_change_rows() {
        let serial = Mutex::new(MemorySink::new());
        let summary = scheduler(1, 3)
            .run(signals(10), &serial, &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.signals, 10);
        assert_eq!(summary.batches, 4);

        let parallel = Mutex::new(MemorySink::new());
        scheduler(4, 3)
            .run(signals(10), &parallel, &CancellationToken::new())
            .unwrap();

        let serial = rows_by_signal(serial.into_inner());
        let parallel = rows_by_signal(parallel.into_inner());
        assert_eq!(serial.len(), 10);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_batches_emitted_whole_and_in_order() {
        let sink = Mutex::new(MemorySink::new());
        scheduler(3, 4)
            .run(signals(10), &sink, &CancellationToken::new())
            .unwrap();

        let mut seen: Vec<Vec<String>> = sink
            .into_inner()
            .into_batches()
            .into_iter()
            .map(|batch| batch.into_iter().map(|s| s.signal_id).collect())
            .collect();
        seen.sort();

        let expected: Vec<Vec<String>> = signals(10)
            .chunks(4)
            .map(|chunk| chunk.iter().map(|s| s.id().to_string()).collect())
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_rows_strictly_increasing_per_signal() {
        let sink = Mutex::new(MemorySink::new());
        scheduler(2, 2)
            .run(signals(5), &sink, &CancellationToken::new())
            .unwrap();

        for (_, rows) in rows_by_signal(sink.into_inner()) {
            assert!(!rows.is_empty());
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.position, i * 16);
            }
        }
    }

    #[test]
    fn test_failed_signal_does_not_abort_batch() {
        let mut registry = FeatureRegistry::new();
        registry
            .register("picky", [1], |engine, _| {
                if engine.sample_rate() == 1234 {
                    Err(FeatureError::Compute("unsupported rate".to_string()))
                } else {
                    Ok(FeatureValue::Scalar(1.0))
                }
            })
            .unwrap();
        let scheduler: BatchScheduler<String> = BatchScheduler::new(
            SchedulerConfig { workers: 2, batch_size: 3 },
            Arc::new(registry),
            EngineConfig { base_window: 32, ..EngineConfig::default() },
        )
        .unwrap();

        let mut input = signals(3);
        input.insert(1, Signal::from_samples("odd-rate", vec![0.5; 256], 1234));
        input.push(Signal::from_samples("empty", Vec::new(), 0));

        let sink = Mutex::new(MemorySink::new());
        let summary = scheduler.run(input, &sink, &CancellationToken::new()).unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].signal_id, "odd-rate");
        assert!(matches!(
            summary.failures[0].error,
            ExtractionError::FeatureCompute { .. }
        ));

        let rows = rows_by_signal(sink.into_inner());
        assert_eq!(rows.len(), 4);
        assert!(!rows.contains_key("odd-rate"));
        assert!(rows["empty"].is_empty());
    }

    #[test]
    fn test_labels_attached() {
        let labeler: Arc<dyn Labeler<String>> =
            Arc::new(PerSignalLabeler::new(|s: &Signal| Some(s.id().to_string())));
        let sink = Mutex::new(MemorySink::new());
        scheduler(2, 2)
            .with_labeler(labeler)
            .run(signals(3), &sink, &CancellationToken::new())
            .unwrap();

        for (id, rows) in rows_by_signal(sink.into_inner()) {
            assert!(rows.iter().all(|r| r.label.as_deref() == Some(id.as_str())));
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let sink = Mutex::new(MemorySink::new());
        let summary = scheduler(2, 2).run(signals(6), &sink, &token).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.rows, 0);
        assert!(sink.into_inner().batches().is_empty());
    }

    struct FailingSink;

    impl RowSink<String> for FailingSink {
        fn emit_batch(&mut self, _: &[SignalRows<String>]) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "closed",
            )))
        }
    }

    #[test]
    fn test_sink_failure_aborts_run() {
        let token = CancellationToken::new();
        let result = scheduler(2, 2).run(signals(6), &Mutex::new(FailingSink), &token);

        assert!(matches!(result, Err(SchedulerError::Sink(_))));
        // The caller's token is left alone
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_empty_input() {
        let sink = Mutex::new(MemorySink::new());
        let summary = scheduler(4, 2)
            .run(Vec::new(), &sink, &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.batches, 0);
        assert_eq!(summary.rows, 0);
    }
}
