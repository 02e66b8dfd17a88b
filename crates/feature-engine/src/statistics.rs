//! Buffer Statistics

use crate::error::DspError;

/// Arithmetic mean of a buffer
pub fn mean(values: &[f64]) -> Result<f64, DspError> {
    if values.is_empty() {
        return Err(DspError::EmptyBuffer);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased (n - 1) variance around a precomputed mean.
///
/// A single value has zero variance.
pub fn variance(values: &[f64], mean: f64) -> Result<f64, DspError> {
    match values.len() {
        0 => Err(DspError::EmptyBuffer),
        1 => Ok(0.0),
        n => {
            let m2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            Ok(m2 / (n - 1) as f64)
        }
    }
}
