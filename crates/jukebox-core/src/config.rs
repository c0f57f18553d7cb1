//! Analysis parameters shared by the extractor and the similarity methods

use crate::error::{JukeboxError, JukeboxResult};
use serde::{Deserialize, Serialize};

/// Default excerpt length analysed from audio files (seconds)
pub const DEFAULT_EXCERPT_LENGTH: f32 = 30.0;

/// Default excerpt start; negative values center the excerpt in the file
pub const DEFAULT_EXCERPT_START: f32 = -48.0;

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // Audio processing
    pub sample_rate: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub min_analysis_seconds: f32,

    // Mel cepstrum
    pub mel_bands: usize,
    pub mfcc_coefficients: usize,
    pub mel_min_hz: f32,
    pub mel_max_hz: f32,

    // Statistics
    pub covariance_regularization: f64,
    pub rolloff_fraction: f32,
    pub log_floor: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            // Audio processing
            sample_rate: 22050,
            frame_size: 1024,
            hop_size: 512,
            min_analysis_seconds: 5.0,

            // Mel cepstrum
            mel_bands: 36,
            mfcc_coefficients: 25,
            mel_min_hz: 20.0,
            mel_max_hz: 11025.0,

            // Statistics
            covariance_regularization: 1e-3,
            rolloff_fraction: 0.85,
            log_floor: 1e-10,
        }
    }
}

impl AnalysisConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> JukeboxResult<()> {
        let invalid = |msg: String| Err(JukeboxError::InvalidConfig(msg));

        if self.sample_rate == 0 {
            return invalid("sample_rate must be > 0".to_string());
        }
        if self.frame_size < 64 || self.frame_size % 2 != 0 {
            return invalid(format!(
                "frame_size must be even and >= 64 (got {})",
                self.frame_size
            ));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return invalid(format!(
                "hop_size must be in 1..={} (got {})",
                self.frame_size, self.hop_size
            ));
        }
        if self.mfcc_coefficients == 0 || self.mfcc_coefficients > self.mel_bands {
            return invalid(format!(
                "mfcc_coefficients must be in 1..={} (got {})",
                self.mel_bands, self.mfcc_coefficients
            ));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.mel_min_hz < 0.0 || self.mel_min_hz >= self.mel_max_hz {
            return invalid("mel_min_hz must be >= 0 and < mel_max_hz".to_string());
        }
        if self.mel_max_hz > nyquist {
            return invalid(format!(
                "mel_max_hz {} exceeds the Nyquist frequency {}",
                self.mel_max_hz, nyquist
            ));
        }
        if !(self.min_analysis_seconds > 0.0) {
            return invalid("min_analysis_seconds must be > 0".to_string());
        }
        if self.min_samples() < self.frame_size + self.hop_size {
            return invalid("min_analysis_seconds must cover at least two frames".to_string());
        }
        if !(self.covariance_regularization > 0.0) {
            return invalid("covariance_regularization must be > 0".to_string());
        }
        if !(self.rolloff_fraction > 0.0 && self.rolloff_fraction < 1.0) {
            return invalid("rolloff_fraction must be in (0, 1)".to_string());
        }
        if !(self.log_floor > 0.0) {
            return invalid("log_floor must be > 0".to_string());
        }
        Ok(())
    }

    /// Minimum number of samples (at `sample_rate`) accepted for analysis
    pub fn min_samples(&self) -> usize {
        (self.min_analysis_seconds as f64 * self.sample_rate as f64).ceil() as usize
    }

    /// Number of power spectrum bins produced per frame
    pub fn spectrum_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_samples(), 110250);
        assert_eq!(config.spectrum_bins(), 513);
    }

    #[test]
    fn test_rejects_too_many_coefficients() {
        let config = AnalysisConfig {
            mfcc_coefficients: 40,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(JukeboxError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_mel_range_above_nyquist() {
        let config = AnalysisConfig {
            sample_rate: 16000,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_minimum() {
        let config = AnalysisConfig {
            min_analysis_seconds: 0.01,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_params() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
