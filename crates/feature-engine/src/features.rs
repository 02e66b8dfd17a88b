//! Built-in Spectral Features

use crate::engine::ExtractionEngine;
use crate::error::{FeatureError, RegistryError};
use crate::registry::{FeatureRegistry, FeatureValue};
use crate::timegrid::TimeSpec;
use std::collections::BTreeMap;
use tracing::info;

/// Names accepted by [`register_builtin`]
pub const BUILTIN_FEATURES: [&str; 3] = ["mean", "stddev", "mfcc"];

/// Mean of the frame's log-power spectrum
fn spectral_mean(engine: &mut ExtractionEngine, tspec: TimeSpec) -> Result<FeatureValue, FeatureError> {
    let spectrum = engine.spectrum(tspec)?;
    Ok(FeatureValue::Scalar(engine.dsp().mean(&spectrum)?))
}

/// Standard deviation of the spectrum, reusing the memoized mean
fn spectral_stddev(
    engine: &mut ExtractionEngine,
    tspec: TimeSpec,
) -> Result<FeatureValue, FeatureError> {
    let mean = engine
        .evaluate("mean", tspec)?
        .as_scalar()
        .ok_or_else(|| FeatureError::Compute("mean is not a scalar".to_string()))?;
    let spectrum = engine.spectrum(tspec)?;
    let variance = engine.dsp().variance(&spectrum, mean)?;
    Ok(FeatureValue::Scalar(variance.sqrt()))
}

/// MFCCs of the frame's samples through the engine's mel filterbank
fn mfcc(engine: &mut ExtractionEngine, tspec: TimeSpec) -> Result<FeatureValue, FeatureError> {
    let samples = engine.samples(tspec)?;
    let filterbank = engine.filterbank(tspec.window)?;
    Ok(FeatureValue::Vector(
        engine.dsp_mut().mfcc(&samples, &filterbank)?,
    ))
}

/// Register one built-in feature by name.
///
/// `stddev` depends on `mean`; if `mean` is not registered it is added with
/// the same factors so the dependency can be evaluated.
pub fn register_builtin<I>(
    registry: &mut FeatureRegistry,
    name: &str,
    factors: I,
) -> Result<(), RegistryError>
where
    I: IntoIterator<Item = usize>,
{
    let factors: Vec<usize> = factors.into_iter().collect();
    match name {
        "mean" => registry.register(name, factors, spectral_mean),
        "stddev" => {
            if registry.get("mean").is_none() {
                registry.register("mean", factors.clone(), spectral_mean)?;
            }
            registry.register(name, factors, spectral_stddev)
        }
        "mfcc" => registry.register(name, factors, mfcc),
        other => Err(RegistryError::UnknownBuiltin(other.to_string())),
    }
}

/// Build a registry from a name -> factors table.
///
/// Features are registered in [`BUILTIN_FEATURES`] order so row layout does
/// not depend on table order.
pub fn builtin_registry(
    features: &BTreeMap<String, Vec<usize>>,
) -> Result<FeatureRegistry, RegistryError> {
    if let Some(unknown) = features
        .keys()
        .find(|name| !BUILTIN_FEATURES.contains(&name.as_str()))
    {
        return Err(RegistryError::UnknownBuiltin(unknown.clone()));
    }

    let mut registry = FeatureRegistry::new();
    for name in BUILTIN_FEATURES {
        if let Some(factors) = features.get(name) {
            register_builtin(&mut registry, name, factors.iter().copied())?;
        }
    }

    info!(
        "Registered {} feature(s) at factors {:?}",
        registry.len(),
        registry.factors()
    );
    Ok(registry)
}

/// Mean, stddev and MFCCs at the base resolution
pub fn default_features() -> BTreeMap<String, Vec<usize>> {
    BUILTIN_FEATURES
        .iter()
        .map(|name| (name.to_string(), vec![1]))
        .collect()
}
