//! DSP Backend
//!
//! Spectra, buffer statistics, mel filterbanks and MFCCs over `rustfft`.
//! The engine treats every method as a deterministic function of its inputs.

use crate::error::DspError;
use crate::statistics;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Floor applied before taking logarithms
const LOG_FLOOR: f64 = 1e-10;

/// Numeric primitives the extraction engine delegates to
pub trait DspBackend: Send {
    /// Log-power spectrum of one window of samples
    fn spectrum(&mut self, samples: &[f64]) -> Result<Vec<f64>, DspError>;

    /// Mean of a buffer
    fn mean(&self, buffer: &[f64]) -> Result<f64, DspError>;

    /// Variance of a buffer around `mean`
    fn variance(&self, buffer: &[f64], mean: f64) -> Result<f64, DspError>;

    /// Build a mel filterbank
    fn filterbank(&self, spec: &FilterbankSpec) -> Result<Filterbank, DspError>;

    /// Mel-frequency cepstral coefficients of one window of samples
    fn mfcc(&mut self, samples: &[f64], filterbank: &Filterbank) -> Result<Vec<f64>, DspError>;
}

/// Spectrum layout flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumOptions {
    /// Keep the DC bin (adds one bin)
    pub include_dc: bool,
    /// Scale powers so the peak bin is 1.0 before taking the log
    pub normalize: bool,
}

/// Parameters of a mel filterbank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterbankSpec {
    /// Number of triangular filters
    pub filter_count: usize,
    /// Window length the filterbank applies to
    pub window: usize,
    /// Sample rate (Hz)
    pub sample_rate: u32,
    /// Lowest filter edge (Hz)
    pub min_frequency: f64,
    /// Highest filter edge (Hz), clamped to Nyquist
    pub max_frequency: f64,
}

/// Equal-gain triangular mel filters over `window / 2 + 1` magnitude bins
#[derive(Debug, Clone, PartialEq)]
pub struct Filterbank {
    window: usize,
    filters: Vec<Vec<f64>>,
}

impl Filterbank {
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn filters(&self) -> &[Vec<f64>] {
        &self.filters
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// `rustfft`-backed implementation of [`DspBackend`]
pub struct SpectrumAnalyzer {
    /// FFT planner for efficient computation
    planner: FftPlanner<f64>,
    /// Spectrum layout
    options: SpectrumOptions,
}

impl SpectrumAnalyzer {
    /// Create a new analyzer
    pub fn new(options: SpectrumOptions) -> Self {
        Self {
            planner: FftPlanner::new(),
            options,
        }
    }

    /// Apply Hamming window to reduce spectral leakage
    fn apply_hamming_window(signal: &mut [f64]) {
        let n = signal.len();
        for (i, sample) in signal.iter_mut().enumerate() {
            let window =
                0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos();
            *sample *= window;
        }
    }

    /// Magnitudes of bins `0..=n/2`
    fn magnitudes(&mut self, samples: &[f64]) -> Result<Vec<f64>, DspError> {
        let n = samples.len();
        if n < 2 {
            return Err(DspError::WindowTooShort(n));
        }

        let mut windowed = samples.to_vec();
        Self::apply_hamming_window(&mut windowed);

        let mut buffer: Vec<Complex<f64>> =
            windowed.iter().map(|&v| Complex::new(v, 0.0)).collect();
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        Ok(buffer.iter().take(n / 2 + 1).map(|c| c.norm()).collect())
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new(SpectrumOptions::default())
    }
}

impl DspBackend for SpectrumAnalyzer {
    fn spectrum(&mut self, samples: &[f64]) -> Result<Vec<f64>, DspError> {
        let n = samples.len() as f64;
        let magnitudes = self.magnitudes(samples)?;
        let half = samples.len() / 2;

        // Bins 1..=n/2 without DC, 0..=n/2 with it
        let start = if self.options.include_dc { 0 } else { 1 };
        let mut power: Vec<f64> = magnitudes[start..=half]
            .iter()
            .map(|m| m * m / n)
            .collect();

        if self.options.normalize {
            let peak = power.iter().cloned().fold(0.0, f64::max);
            if peak > 0.0 {
                power.iter_mut().for_each(|p| *p /= peak);
            }
        }

        Ok(power
            .into_iter()
            .map(|p| 10.0 * p.max(LOG_FLOOR).log10())
            .collect())
    }

    fn mean(&self, buffer: &[f64]) -> Result<f64, DspError> {
        statistics::mean(buffer)
    }

    fn variance(&self, buffer: &[f64], mean: f64) -> Result<f64, DspError> {
        statistics::variance(buffer, mean)
    }

    fn filterbank(&self, spec: &FilterbankSpec) -> Result<Filterbank, DspError> {
        if spec.filter_count == 0 {
            return Err(DspError::InvalidFilterbank(
                "filter count must be positive".to_string(),
            ));
        }
        if spec.window < 2 {
            return Err(DspError::WindowTooShort(spec.window));
        }
        if spec.sample_rate == 0 {
            return Err(DspError::InvalidFilterbank(
                "sample rate must be positive".to_string(),
            ));
        }

        let sample_rate = spec.sample_rate as f64;
        let max_frequency = spec.max_frequency.min(sample_rate / 2.0);
        if spec.min_frequency < 0.0 || spec.min_frequency >= max_frequency {
            return Err(DspError::InvalidFilterbank(format!(
                "frequency range {}..{} Hz is empty",
                spec.min_frequency, max_frequency
            )));
        }

        // filter_count + 2 edges evenly spaced on the mel scale
        let mel_low = hz_to_mel(spec.min_frequency);
        let mel_high = hz_to_mel(max_frequency);
        let step = (mel_high - mel_low) / (spec.filter_count + 1) as f64;
        let edges: Vec<f64> = (0..spec.filter_count + 2)
            .map(|i| mel_to_hz(mel_low + step * i as f64))
            .collect();

        let bins = spec.window / 2 + 1;
        let bin_hz = sample_rate / spec.window as f64;
        let filters = edges
            .windows(3)
            .map(|edge| {
                let (left, center, right) = (edge[0], edge[1], edge[2]);
                (0..bins)
                    .map(|k| {
                        let freq = k as f64 * bin_hz;
                        if freq >= left && freq <= center {
                            (freq - left) / (center - left)
                        } else if freq > center && freq <= right {
                            (right - freq) / (right - center)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(Filterbank {
            window: spec.window,
            filters,
        })
    }

    fn mfcc(&mut self, samples: &[f64], filterbank: &Filterbank) -> Result<Vec<f64>, DspError> {
        if samples.len() != filterbank.window {
            return Err(DspError::LengthMismatch {
                expected: filterbank.window,
                actual: samples.len(),
            });
        }

        let magnitudes = self.magnitudes(samples)?;
        let log_energies: Vec<f64> = filterbank
            .filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter.iter().zip(&magnitudes).map(|(w, m)| w * m).sum();
                energy.max(LOG_FLOOR).ln()
            })
            .collect();

        // DCT-II, one coefficient per filter
        let n = log_energies.len() as f64;
        Ok((0..log_energies.len())
            .map(|k| {
                log_energies
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        e * (std::f64::consts::PI * k as f64 * (i as f64 + 0.5) / n).cos()
                    })
                    .sum()
            })
            .collect())
    }
}
