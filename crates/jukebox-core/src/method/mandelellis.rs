//! Mandel-Ellis timbre model
//!
//! Each track is a single multivariate Gaussian over its MFCC frames. The
//! feature vector holds the mean, the covariance and the inverse covariance
//! (both as packed upper triangles) so comparisons never invert a matrix.
//! Tracks are compared with the symmetrized Kullback-Leibler divergence,
//! divided by the mean divergence observed during training.

use super::gaussian::{self, packed_len};
use super::{check_dimension, check_training_set, FittedState, SimilarityMethod, MANDELELLIS};
use crate::config::AnalysisConfig;
use crate::error::{JukeboxError, JukeboxResult};
use crate::features::FeatureVector;
use crate::transform::FrameAnalysis;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct MandelEllis {
    coefficients: usize,
    regularization: f64,
}

impl MandelEllis {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            coefficients: config.mfcc_coefficients,
            regularization: config.covariance_regularization,
        }
    }

    /// Split a vector into (mean, covariance, inverse covariance)
    fn parts<'a>(&self, v: &'a FeatureVector) -> (&'a [f32], &'a [f32], &'a [f32]) {
        let d = self.coefficients;
        let tri = packed_len(d);
        let values = v.as_slice();
        (&values[..d], &values[d..d + tri], &values[d + tri..])
    }

    /// Symmetrized KL divergence between two summaries, clamped at zero
    fn divergence(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        if a == b {
            return 0.0;
        }

        let d = self.coefficients;
        let (mean_a, cov_a, inv_a) = self.parts(a);
        let (mean_b, cov_b, inv_b) = self.parts(b);

        let traces = gaussian::packed_trace_product(inv_a, cov_b, d)
            + gaussian::packed_trace_product(inv_b, cov_a, d);

        let delta: Vec<f64> = mean_a
            .iter()
            .zip(mean_b)
            .map(|(&x, &y)| x as f64 - y as f64)
            .collect();
        let inv_sum: Vec<f32> = inv_a.iter().zip(inv_b).map(|(x, y)| x + y).collect();
        let mahalanobis = gaussian::packed_quadratic_form(&inv_sum, &delta, d);

        let kl = 0.5 * (traces + mahalanobis) - d as f64;
        if kl.is_finite() {
            kl.max(0.0)
        } else {
            f64::MAX
        }
    }

    fn kl_scale(&self, state: &FittedState) -> JukeboxResult<f64> {
        match state {
            FittedState::KlScale { scale } if scale.is_finite() && *scale > 0.0 => Ok(*scale),
            FittedState::KlScale { scale } => Err(JukeboxError::IncompatibleState(format!(
                "{} scale must be positive (got {})",
                MANDELELLIS, scale
            ))),
            other => Err(JukeboxError::IncompatibleState(format!(
                "{} cannot use {} parameters",
                MANDELELLIS,
                other.kind()
            ))),
        }
    }
}

impl SimilarityMethod for MandelEllis {
    fn name(&self) -> &'static str {
        MANDELELLIS
    }

    fn about(&self) -> &'static str {
        "Single Gaussian MFCC model compared by symmetrized Kullback-Leibler divergence"
    }

    fn dimension(&self) -> usize {
        self.coefficients + 2 * packed_len(self.coefficients)
    }

    fn min_training_size(&self) -> usize {
        2
    }

    fn summarize(&self, analysis: &FrameAnalysis) -> JukeboxResult<FeatureVector> {
        let d = self.coefficients;
        let (mean, covariance) = gaussian::fit(&analysis.mfcc, d, self.regularization)
            .ok_or_else(|| {
                JukeboxError::InvalidAudio(format!(
                    "need at least 2 frames for a covariance estimate, got {}",
                    analysis.num_frames()
                ))
            })?;

        let inverse = gaussian::cholesky_inverse(&covariance, d).ok_or_else(|| {
            JukeboxError::InvalidAudio("MFCC covariance is not positive definite".to_string())
        })?;

        let mut values = Vec::with_capacity(self.dimension());
        values.extend(mean.iter().map(|&m| m as f32));
        values.extend(gaussian::pack_upper(&covariance, d));
        values.extend(gaussian::pack_upper(&inverse, d));
        Ok(FeatureVector::new(values))
    }

    fn train(&self, vectors: &[&FeatureVector]) -> JukeboxResult<FittedState> {
        check_training_set(self, vectors)?;

        let n = vectors.len();
        // Row sums are collected in order so the total does not depend on scheduling
        let row_sums: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| self.divergence(vectors[i], vectors[j]))
                    .sum::<f64>()
            })
            .collect();
        let total: f64 = row_sums.iter().sum();
        let pairs = (n * (n - 1) / 2) as f64;
        let mean = total / pairs;

        let scale = if mean.is_finite() && mean > 0.0 {
            mean
        } else {
            log::warn!(
                "{}: degenerate training set (mean divergence {}), using unit scale",
                MANDELELLIS,
                mean
            );
            1.0
        };

        log::debug!("{}: trained on {} tracks, scale {:.6}", MANDELELLIS, n, scale);
        Ok(FittedState::KlScale { scale })
    }

    fn check_state(&self, state: &FittedState) -> JukeboxResult<()> {
        self.kl_scale(state).map(|_| ())
    }

    fn similarity(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
        state: &FittedState,
    ) -> JukeboxResult<f32> {
        let scale = self.kl_scale(state)?;
        check_dimension(self, a)?;
        check_dimension(self, b)?;

        Ok((self.divergence(a, b) / scale) as f32)
    }
}
