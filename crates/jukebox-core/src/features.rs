//! Feature extraction from PCM audio

use crate::audio::resample_to_target;
use crate::config::AnalysisConfig;
use crate::error::{JukeboxError, JukeboxResult};
use crate::method::SimilarityMethod;
use crate::transform::SpectralAnalyzer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed-length numeric summary of one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Little-endian `f32` encoding, 4 bytes per value
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`FeatureVector::to_le_bytes`]; `None` if the length is not a multiple of 4
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(Self(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ))
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Turns PCM into feature vectors for one similarity method
#[derive(Clone)]
pub struct FeatureExtractor {
    config: AnalysisConfig,
    analyzer: SpectralAnalyzer,
    method: Arc<dyn SimilarityMethod>,
}

impl FeatureExtractor {
    pub fn new(config: &AnalysisConfig, method: Arc<dyn SimilarityMethod>) -> JukeboxResult<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            analyzer: SpectralAnalyzer::new(config),
            method,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Vector length produced by [`FeatureExtractor::extract`]
    pub fn dimension(&self) -> usize {
        self.method.dimension()
    }

    /// Fewest samples at the analysis rate accepted by [`FeatureExtractor::extract`]
    pub fn min_samples(&self) -> usize {
        self.config.min_samples()
    }

    /// Analyze mono PCM at `sample_rate`
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> JukeboxResult<FeatureVector> {
        if sample_rate == 0 {
            return Err(JukeboxError::InvalidAudio(
                "sample_rate must be > 0".to_string(),
            ));
        }
        if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
            return Err(JukeboxError::InvalidAudio(format!(
                "non-finite sample at index {}",
                idx
            )));
        }

        let resampled;
        let samples = if sample_rate != self.config.sample_rate {
            resampled = resample_to_target(samples, sample_rate, self.config.sample_rate)
                .map_err(|e| JukeboxError::InvalidAudio(e.to_string()))?;
            &resampled[..]
        } else {
            samples
        };

        let required = self.min_samples();
        if samples.len() < required {
            return Err(JukeboxError::InsufficientAudio {
                got: samples.len(),
                required,
            });
        }

        let analysis = self.analyzer.analyze(samples);
        log::trace!(
            "{}: analyzed {} samples into {} frames",
            self.method.name(),
            samples.len(),
            analysis.num_frames()
        );

        let vector = self.method.summarize(&analysis)?;
        if vector.len() != self.method.dimension() {
            return Err(JukeboxError::DimensionMismatch {
                method: self.method.name().to_string(),
                expected: self.method.dimension(),
                found: vector.len(),
            });
        }
        Ok(vector)
    }
}
