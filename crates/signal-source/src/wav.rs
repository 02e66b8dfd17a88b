//! WAV Decoding

use crate::{SignalData, SourceError};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::debug;

/// Decode a WAV file into mono `f64` samples in [-1.0, 1.0].
///
/// Multi-channel files are mixed down by averaging each frame.
pub fn decode_wav(path: &Path) -> Result<SignalData, SourceError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(SourceError::NoChannels);
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples: Vec<f64> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    };

    debug!(
        "Decoded {}: {} frames, {} Hz, {} channel(s)",
        path.display(),
        samples.len(),
        spec.sample_rate,
        channels
    );

    Ok(SignalData::new(samples, spec.sample_rate))
}
