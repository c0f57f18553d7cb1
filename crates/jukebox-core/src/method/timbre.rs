//! Flat timbre statistics
//!
//! The vector holds MFCC means and standard deviations followed by the mean
//! and standard deviation of each frame descriptor. Training standardizes
//! every dimension over the collection; the distance is the RMS difference
//! of two standardized vectors.

use super::{check_dimension, check_training_set, FittedState, SimilarityMethod, TIMBRE};
use crate::config::AnalysisConfig;
use crate::error::{JukeboxError, JukeboxResult};
use crate::features::FeatureVector;
use crate::transform::{FrameAnalysis, FrameDescriptors};

/// Scale substituted for dimensions that do not vary across the collection
const MIN_SCALE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Timbre {
    coefficients: usize,
}

impl Timbre {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            coefficients: config.mfcc_coefficients,
        }
    }

    fn standardization<'a>(&self, state: &'a FittedState) -> JukeboxResult<(&'a [f32], &'a [f32])> {
        match state {
            FittedState::Standardization { mean, scale }
                if mean.len() == self.dimension() && scale.len() == self.dimension() =>
            {
                if mean.iter().any(|m| !m.is_finite())
                    || scale.iter().any(|s| !s.is_finite() || *s <= 0.0)
                {
                    return Err(JukeboxError::IncompatibleState(format!(
                        "{} parameters must be finite with positive scales",
                        TIMBRE
                    )));
                }
                Ok((mean.as_slice(), scale.as_slice()))
            }
            FittedState::Standardization { mean, .. } => Err(JukeboxError::IncompatibleState(
                format!(
                    "{} parameters have {} dimensions, expected {}",
                    TIMBRE,
                    mean.len(),
                    self.dimension()
                ),
            )),
            other => Err(JukeboxError::IncompatibleState(format!(
                "{} cannot use {} parameters",
                TIMBRE,
                other.kind()
            ))),
        }
    }
}

/// Population mean and standard deviation
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}

impl SimilarityMethod for Timbre {
    fn name(&self) -> &'static str {
        TIMBRE
    }

    fn about(&self) -> &'static str {
        "Standardized MFCC and spectral descriptor statistics compared by RMS difference"
    }

    fn dimension(&self) -> usize {
        2 * self.coefficients + 2 * FrameDescriptors::COUNT
    }

    fn min_training_size(&self) -> usize {
        2
    }

    fn summarize(&self, analysis: &FrameAnalysis) -> JukeboxResult<FeatureVector> {
        if analysis.is_empty() {
            return Err(JukeboxError::InvalidAudio(
                "no complete frames to summarize".to_string(),
            ));
        }

        let d = self.coefficients;
        let mut means = Vec::with_capacity(d);
        let mut stds = Vec::with_capacity(d);
        for k in 0..d {
            let (mean, std) = mean_std(analysis.mfcc.iter().map(|frame| frame[k] as f64));
            means.push(mean as f32);
            stds.push(std as f32);
        }

        let mut values = Vec::with_capacity(self.dimension());
        values.extend(means);
        values.extend(stds);
        for idx in 0..FrameDescriptors::COUNT {
            let (mean, std) =
                mean_std(analysis.descriptors.iter().map(|d| d.to_array()[idx] as f64));
            values.push(mean as f32);
            values.push(std as f32);
        }

        Ok(FeatureVector::new(values))
    }

    fn train(&self, vectors: &[&FeatureVector]) -> JukeboxResult<FittedState> {
        check_training_set(self, vectors)?;

        let mut mean = Vec::with_capacity(self.dimension());
        let mut scale = Vec::with_capacity(self.dimension());
        for i in 0..self.dimension() {
            let (m, s) = mean_std(vectors.iter().map(|v| v.as_slice()[i] as f64));
            mean.push(m as f32);
            scale.push(if s < MIN_SCALE { 1.0 } else { s as f32 });
        }

        log::debug!("{}: trained on {} tracks", TIMBRE, vectors.len());
        Ok(FittedState::Standardization { mean, scale })
    }

    fn check_state(&self, state: &FittedState) -> JukeboxResult<()> {
        self.standardization(state).map(|_| ())
    }

    fn similarity(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
        state: &FittedState,
    ) -> JukeboxResult<f32> {
        let (mean, scale) = self.standardization(state)?;
        check_dimension(self, a)?;
        check_dimension(self, b)?;

        if a == b {
            return Ok(0.0);
        }

        let sum: f64 = a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .zip(mean.iter().zip(scale))
            .map(|((&x, &y), (&m, &s))| {
                let zx = (x as f64 - m as f64) / s as f64;
                let zy = (y as f64 - m as f64) / s as f64;
                (zx - zy).powi(2)
            })
            .sum();

        Ok((sum / self.dimension() as f64).sqrt() as f32)
    }
}
