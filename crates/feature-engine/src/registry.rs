//! Feature Registry and Memoized Evaluation

use crate::engine::ExtractionEngine;
use crate::error::{FeatureError, RegistryError};
use crate::timegrid::TimeSpec;
use bounded_cache::BoundedCache;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Output of one feature at one TimeSpec
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl FeatureValue {
    /// Append to a row: vectors are flattened, scalars pushed
    pub fn extend_into(&self, row: &mut Vec<f64>) {
        match self {
            FeatureValue::Scalar(v) => row.push(*v),
            FeatureValue::Vector(values) => row.extend_from_slice(values),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FeatureValue::Scalar(v) => Some(*v),
            FeatureValue::Vector(_) => None,
        }
    }

    /// Number of row columns this value occupies
    pub fn width(&self) -> usize {
        match self {
            FeatureValue::Scalar(_) => 1,
            FeatureValue::Vector(values) => values.len(),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Scalar(value)
    }
}

impl From<Vec<f64>> for FeatureValue {
    fn from(values: Vec<f64>) -> Self {
        FeatureValue::Vector(values)
    }
}

/// Memoization table: TimeSpec -> feature name -> value
pub type FeatureCache = BoundedCache<TimeSpec, HashMap<String, FeatureValue>>;

/// Boxed compute function stored in the registry
pub type ComputeFn =
    Box<dyn Fn(&mut ExtractionEngine, TimeSpec) -> Result<FeatureValue, FeatureError> + Send + Sync>;

/// A compute function that runs at most once per TimeSpec.
///
/// Results live in the engine's [`FeatureCache`]; a compute function may call
/// back into [`ExtractionEngine::evaluate`] for the features it depends on.
pub struct Memoized<F> {
    name: String,
    compute: F,
}

impl<F> Memoized<F>
where
    F: Fn(&mut ExtractionEngine, TimeSpec) -> Result<FeatureValue, FeatureError>,
{
    pub fn new(name: impl Into<String>, compute: F) -> Self {
        Self {
            name: name.into(),
            compute,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the cached value for `tspec`, computing and storing it on a miss
    pub fn evaluate(
        &self,
        engine: &mut ExtractionEngine,
        tspec: TimeSpec,
    ) -> Result<FeatureValue, FeatureError> {
        if let Ok(cached) = engine.feature_cache().get(&tspec) {
            if let Some(value) = cached.get(&self.name) {
                return Ok(value.clone());
            }
        }

        let value = (self.compute)(engine, tspec)?;
        engine
            .feature_cache_mut()
            .get_or_insert_with(tspec, HashMap::new)
            .insert(self.name.clone(), value.clone());
        Ok(value)
    }
}

/// A named feature and the resolution factors it runs at
pub struct FeatureDescriptor {
    factors: BTreeSet<usize>,
    compute: Memoized<ComputeFn>,
}

impl FeatureDescriptor {
    pub fn name(&self) -> &str {
        self.compute.name()
    }

    pub fn factors(&self) -> &BTreeSet<usize> {
        &self.factors
    }

    pub fn evaluate(
        &self,
        engine: &mut ExtractionEngine,
        tspec: TimeSpec,
    ) -> Result<FeatureValue, FeatureError> {
        self.compute.evaluate(engine, tspec)
    }
}

impl fmt::Debug for FeatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureDescriptor")
            .field("name", &self.name())
            .field("factors", &self.factors)
            .finish()
    }
}

/// Explicitly registered features, iterated in registration order.
///
/// Immutable once handed to engines; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    descriptors: Vec<FeatureDescriptor>,
    by_name: HashMap<String, usize>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feature evaluated at every factor in `factors`
    pub fn register<I, F>(&mut self, name: &str, factors: I, compute: F) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = usize>,
        F: Fn(&mut ExtractionEngine, TimeSpec) -> Result<FeatureValue, FeatureError>
            + Send
            + Sync
            + 'static,
    {
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateFeature(name.to_string()));
        }
        let factors: BTreeSet<usize> = factors.into_iter().collect();
        if factors.is_empty() {
            return Err(RegistryError::NoFactors(name.to_string()));
        }
        if factors.contains(&0) {
            return Err(RegistryError::ZeroFactor(name.to_string()));
        }

        let compute: ComputeFn = Box::new(compute);
        self.by_name.insert(name.to_string(), self.descriptors.len());
        self.descriptors.push(FeatureDescriptor {
            factors,
            compute: Memoized::new(name, compute),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FeatureDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    /// Distinct factors required across all features
    pub fn factors(&self) -> BTreeSet<usize> {
        self.descriptors
            .iter()
            .flat_map(|d| d.factors.iter().copied())
            .collect()
    }

    /// Features to run at `factor`, in registration order
    pub fn for_factor(&self, factor: usize) -> impl Iterator<Item = &FeatureDescriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.factors.contains(&factor))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
