//! Multi-resolution Extraction Engine

use crate::dsp::{DspBackend, Filterbank, FilterbankSpec, SpectrumAnalyzer, SpectrumOptions};
use crate::error::{ExtractionError, FeatureError};
use crate::labels::{LabelAligner, Labeler};
use crate::registry::{FeatureCache, FeatureRegistry, FeatureValue};
use crate::timegrid::{map_index, Resolution, TimeGrid, TimeSpec};
use bounded_cache::BoundedCache;
use serde::{Deserialize, Serialize};
use signal_source::Signal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base analysis window in samples
    pub base_window: usize,
    /// Per-signal cache capacity in TimeSpecs (0 = unbounded)
    pub cache_capacity: usize,
    /// Mel filters per filterbank (also the MFCC count)
    pub filter_count: usize,
    /// Lowest mel filter edge (Hz)
    pub min_frequency: f64,
    /// Highest mel filter edge (Hz)
    pub max_frequency: f64,
    /// Spectrum layout
    pub spectrum: SpectrumOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_window: 64,
            cache_capacity: 0,
            filter_count: 20,
            min_frequency: 80.0,
            max_frequency: 18000.0,
            spectrum: SpectrumOptions::default(),
        }
    }
}

/// One aligned output timestep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow<L = String> {
    /// Sample position on the minstep grid
    pub position: usize,
    /// Ground-truth label, if any
    pub label: Option<L>,
    /// Concatenated feature values, finest resolution first
    pub values: Vec<f64>,
}

impl<L> FeatureRow<L> {
    pub fn unlabeled(position: usize, values: Vec<f64>) -> Self {
        Self {
            position,
            label: None,
            values,
        }
    }
}

/// Drives the multi-resolution sweep over one signal at a time.
///
/// Each engine owns its caches; engines are never shared between threads.
pub struct ExtractionEngine {
    registry: Arc<FeatureRegistry>,
    dsp: Box<dyn DspBackend>,
    config: EngineConfig,
    feature_cache: FeatureCache,
    spectra: BoundedCache<TimeSpec, Arc<[f64]>>,
    windows: BoundedCache<TimeSpec, Arc<[f64]>>,
    /// Built on first use per (window, sample rate); survives across signals
    filterbanks: HashMap<(usize, u32), Arc<Filterbank>>,
    sample_rate: u32,
    cancel: Option<CancellationToken>,
}

impl ExtractionEngine {
    /// Create an engine with an explicit DSP backend
    pub fn new(
        registry: Arc<FeatureRegistry>,
        dsp: Box<dyn DspBackend>,
        config: EngineConfig,
    ) -> Self {
        let capacity = config.cache_capacity;
        Self {
            registry,
            dsp,
            config,
            feature_cache: BoundedCache::new(capacity),
            spectra: BoundedCache::new(capacity),
            windows: BoundedCache::new(capacity),
            filterbanks: HashMap::new(),
            sample_rate: 0,
            cancel: None,
        }
    }

    /// Create an engine backed by [`SpectrumAnalyzer`]
    pub fn with_config(registry: Arc<FeatureRegistry>, config: EngineConfig) -> Self {
        let dsp = Box::new(SpectrumAnalyzer::new(config.spectrum));
        Self::new(registry, dsp, config)
    }

    /// Check `token` between frames and abort with [`ExtractionError::Cancelled`]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FeatureRegistry> {
        &self.registry
    }

    /// Sample rate of the signal being processed
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn dsp(&self) -> &dyn DspBackend {
        self.dsp.as_ref()
    }

    pub fn dsp_mut(&mut self) -> &mut dyn DspBackend {
        self.dsp.as_mut()
    }

    pub fn feature_cache(&self) -> &FeatureCache {
        &self.feature_cache
    }

    pub(crate) fn feature_cache_mut(&mut self) -> &mut FeatureCache {
        &mut self.feature_cache
    }

    /// Spectrum of the frame at `tspec`
    pub fn spectrum(&self, tspec: TimeSpec) -> Result<Arc<[f64]>, FeatureError> {
        self.spectra
            .get(&tspec)
            .cloned()
            .map_err(|_| FeatureError::MissingSpectrum(tspec))
    }

    /// Raw samples of the frame at `tspec`
    pub fn samples(&self, tspec: TimeSpec) -> Result<Arc<[f64]>, FeatureError> {
        self.windows
            .get(&tspec)
            .cloned()
            .map_err(|_| FeatureError::MissingSamples(tspec))
    }

    /// Mel filterbank for `window` at the current sample rate
    pub fn filterbank(&mut self, window: usize) -> Result<Arc<Filterbank>, FeatureError> {
        let key = (window, self.sample_rate);
        if let Some(bank) = self.filterbanks.get(&key) {
            return Ok(Arc::clone(bank));
        }

        let spec = FilterbankSpec {
            filter_count: self.config.filter_count,
            window,
            sample_rate: self.sample_rate,
            min_frequency: self.config.min_frequency,
            max_frequency: self.config.max_frequency,
        };
        let bank = Arc::new(self.dsp.filterbank(&spec)?);
        debug!(
            "Built {}-filter bank for window {} at {} Hz",
            spec.filter_count, window, self.sample_rate
        );
        self.filterbanks.insert(key, Arc::clone(&bank));
        Ok(bank)
    }

    /// Evaluate a registered feature, memoized per TimeSpec
    pub fn evaluate(&mut self, name: &str, tspec: TimeSpec) -> Result<FeatureValue, FeatureError> {
        let registry = Arc::clone(&self.registry);
        let descriptor = registry
            .get(name)
            .ok_or_else(|| FeatureError::UnknownFeature(name.to_string()))?;
        descriptor.evaluate(self, tspec)
    }

    /// Extract one row per minstep-grid position of `signal`.
    ///
    /// Coarser resolutions are replicated across the fine positions they
    /// cover; past the end of a shorter coarse stream its last frame repeats.
    /// A resolution with no full frame contributes no columns.
    pub fn features<L>(
        &mut self,
        signal: &Signal,
        min_window: usize,
    ) -> Result<Vec<FeatureRow<L>>, ExtractionError> {
        let registry = Arc::clone(&self.registry);
        let grid = TimeGrid::new(min_window, registry.factors())?;
        self.begin_signal(signal);

        let samples = signal.samples();
        let Some(finest) = grid.finest().copied() else {
            debug!("No features registered; {} yields no rows", signal.id());
            return Ok(Vec::new());
        };

        let mut streams: Vec<(Resolution, Vec<Vec<f64>>)> =
            Vec::with_capacity(grid.resolutions().len());
        for resolution in grid.resolutions() {
            let mut segments = Vec::with_capacity(grid.frame_count(resolution, samples.len()));

            for position in grid.frames(resolution, samples.len()) {
                self.check_cancelled()?;

                let tspec = TimeSpec::new(position, resolution.window);
                let window = &samples[position..position + resolution.window];
                let spectrum = self
                    .dsp
                    .spectrum(window)
                    .map_err(|source| ExtractionError::Spectrum { tspec, source })?;
                self.windows.put(tspec, Arc::from(window));
                self.spectra.put(tspec, Arc::from(spectrum));

                let mut segment = Vec::new();
                for descriptor in registry.for_factor(resolution.factor) {
                    let value = descriptor.evaluate(self, tspec).map_err(|source| {
                        ExtractionError::FeatureCompute {
                            feature: descriptor.name().to_string(),
                            tspec,
                            source,
                        }
                    })?;
                    value.extend_into(&mut segment);
                }
                segments.push(segment);
            }

            if segments.is_empty() && !samples.is_empty() {
                warn!(
                    "{}: no full {}-sample window in {} samples; factor {} features omitted",
                    signal.id(),
                    resolution.window,
                    samples.len(),
                    resolution.factor
                );
            }
            streams.push((*resolution, segments));
        }

        let min_step = grid.min_step();
        let row_count = grid.frame_count(&finest, samples.len());
        let rows: Vec<FeatureRow<L>> = (0..row_count)
            .map(|i| {
                let mut values = Vec::new();
                for (resolution, segments) in &streams {
                    if let Some(last) = segments.len().checked_sub(1) {
                        let j = map_index(i, min_step, resolution.shift).min(last);
                        values.extend_from_slice(&segments[j]);
                    }
                }
                FeatureRow::unlabeled(i * min_step, values)
            })
            .collect();

        debug!(
            "{}: {} rows across {} resolution(s)",
            signal.id(),
            rows.len(),
            streams.len()
        );
        Ok(rows)
    }

    /// Extract rows and attach labels from `labeler`
    pub fn labeled_features<L: Clone>(
        &mut self,
        signal: &Signal,
        min_window: usize,
        labeler: Option<&dyn Labeler<L>>,
    ) -> Result<Vec<FeatureRow<L>>, ExtractionError> {
        let mut rows = self.features(signal, min_window)?;
        if let Some(labeler) = labeler {
            let mut aligner = LabelAligner::new(labeler.labels(signal)?)?;
            aligner.attach(&mut rows)?;
        }
        Ok(rows)
    }

    /// Drop every per-signal cache
    fn begin_signal(&mut self, signal: &Signal) {
        self.feature_cache.clear();
        self.spectra.clear();
        self.windows.clear();
        self.sample_rate = signal.sample_rate();
    }

    fn check_cancelled(&self) -> Result<(), ExtractionError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ExtractionError::Cancelled),
            _ => Ok(()),
        }
    }
}
