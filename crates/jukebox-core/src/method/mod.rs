//! Similarity methods
//!
//! A method decides what a track's [`FeatureVector`] contains, how a
//! collection of vectors is turned into normalization parameters
//! ([`FittedState`]) and how two vectors are compared under those
//! parameters. Scores are distances: lower is more similar and identical
//! vectors score exactly zero.

#[cfg(feature = "mandelellis")]
mod gaussian;
#[cfg(feature = "mandelellis")]
mod mandelellis;
#[cfg(feature = "timbre")]
mod timbre;

#[cfg(feature = "mandelellis")]
pub use mandelellis::MandelEllis;
#[cfg(feature = "timbre")]
pub use timbre::Timbre;

use crate::config::AnalysisConfig;
use crate::error::{JukeboxError, JukeboxResult};
use crate::features::FeatureVector;
use crate::transform::FrameAnalysis;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Single-Gaussian MFCC model compared by symmetric Kullback-Leibler divergence
pub const MANDELELLIS: &str = "mandelellis";

/// Standardized statistics of MFCCs and spectral descriptors
pub const TIMBRE: &str = "timbre";

/// Method used when none is requested
pub const DEFAULT_METHOD: &str = TIMBRE;

/// Normalization parameters produced by [`SimilarityMethod::train`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedState {
    /// Divisor applied to raw divergences
    KlScale { scale: f64 },
    /// Per-dimension location and scale
    Standardization { mean: Vec<f32>, scale: Vec<f32> },
}

impl FittedState {
    pub fn kind(&self) -> &'static str {
        match self {
            FittedState::KlScale { .. } => "kl-scale",
            FittedState::Standardization { .. } => "standardization",
        }
    }
}

pub trait SimilarityMethod: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// One-line human readable description
    fn about(&self) -> &'static str;

    /// Length of the feature vectors produced by [`SimilarityMethod::summarize`]
    fn dimension(&self) -> usize;

    /// Fewest vectors [`SimilarityMethod::train`] accepts
    fn min_training_size(&self) -> usize;

    /// Reduce a frame analysis to a fixed-length feature vector
    fn summarize(&self, analysis: &FrameAnalysis) -> JukeboxResult<FeatureVector>;

    /// Fit normalization parameters on a representative sample of vectors
    fn train(&self, vectors: &[&FeatureVector]) -> JukeboxResult<FittedState>;

    /// Accept only a state this method could have fitted at its dimension
    fn check_state(&self, state: &FittedState) -> JukeboxResult<()>;

    /// Distance between two vectors under a fitted state
    fn similarity(&self, a: &FeatureVector, b: &FeatureVector, state: &FittedState)
        -> JukeboxResult<f32>;
}

/// Names of the methods compiled into this build
pub fn available_methods() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "mandelellis")]
    names.push(MANDELELLIS);
    #[cfg(feature = "timbre")]
    names.push(TIMBRE);
    names
}

/// [`DEFAULT_METHOD`] when compiled in, otherwise the first available method
pub fn default_method() -> Option<&'static str> {
    let names = available_methods();
    if names.contains(&DEFAULT_METHOD) {
        Some(DEFAULT_METHOD)
    } else {
        names.first().copied()
    }
}

/// Instantiate a method by name
pub fn create_method(
    name: &str,
    config: &AnalysisConfig,
) -> JukeboxResult<Arc<dyn SimilarityMethod>> {
    config.validate()?;
    match name {
        #[cfg(feature = "mandelellis")]
        MANDELELLIS => Ok(Arc::new(MandelEllis::new(config))),
        #[cfg(feature = "timbre")]
        TIMBRE => Ok(Arc::new(Timbre::new(config))),
        other => Err(JukeboxError::UnknownMethod(other.to_string())),
    }
}

/// Common training preconditions: enough vectors, one dimensionality, finite values
pub(crate) fn check_training_set(
    method: &dyn SimilarityMethod,
    vectors: &[&FeatureVector],
) -> JukeboxResult<()> {
    if vectors.len() < method.min_training_size() {
        return Err(JukeboxError::Training(format!(
            "{} needs at least {} tracks, got {}",
            method.name(),
            method.min_training_size(),
            vectors.len()
        )));
    }

    for (i, vector) in vectors.iter().enumerate() {
        if vector.len() != method.dimension() {
            return Err(JukeboxError::Training(format!(
                "vector {} has {} values, expected {}",
                i,
                vector.len(),
                method.dimension()
            )));
        }
        if !vector.is_finite() {
            return Err(JukeboxError::Training(format!(
                "vector {} contains non-finite values",
                i
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_dimension(
    method: &dyn SimilarityMethod,
    vector: &FeatureVector,
) -> JukeboxResult<()> {
    if vector.len() != method.dimension() {
        return Err(JukeboxError::DimensionMismatch {
            method: method.name().to_string(),
            expected: method.dimension(),
            found: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry() {
        let config = AnalysisConfig::default();
        for name in available_methods() {
            let method = create_method(name, &config).unwrap();
            assert_eq!(method.name(), name);
            assert!(method.dimension() > 0);
            assert!(method.min_training_size() >= 1);
            assert!(!method.about().is_empty());
        }
        assert!(matches!(
            create_method("nonexistent", &config),
            Err(JukeboxError::UnknownMethod(_))
        ));
    }

    #[cfg(feature = "timbre")]
    #[test]
    fn test_default_method() {
        assert_eq!(default_method(), Some(TIMBRE));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            hop_size: 0,
            ..AnalysisConfig::default()
        };
        for name in available_methods() {
            assert!(matches!(
                create_method(name, &config),
                Err(JukeboxError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_state_survives_bincode() {
        let state = FittedState::Standardization {
            mean: vec![0.5, -1.0],
            scale: vec![1.0, 2.0],
        };
        let bytes = bincode::serialize(&state).unwrap();
        let parsed: FittedState = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parsed, state);
        assert_eq!(parsed.kind(), "standardization");
    }
}
