//! TOML settings for jukebox front ends
//!
//! Every table and key is optional; missing values fall back to the defaults
//! below.
//!
//! ```toml
//! [jukebox]
//! method = "mandelellis"
//! decoder = "ffmpeg"
//!
//! [excerpt]
//! start_s = -48.0
//! length_s = 30.0
//!
//! [training]
//! max_tracks = 1000
//!
//! [snapshot]
//! compress = true
//!
//! [logging]
//! debug_level = 3
//!
//! [analysis]
//! mfcc_coefficients = 20
//! ```

use crate::config::{AnalysisConfig, DEFAULT_EXCERPT_LENGTH, DEFAULT_EXCERPT_START};
use crate::runtime::DebugLevel;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JukeboxSettings {
    #[serde(default)]
    pub jukebox: JukeboxSection,
    #[serde(default)]
    pub excerpt: ExcerptSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Method and decoder selection; `None` picks the build's default
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JukeboxSection {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub decoder: Option<String>,
}

/// Portion of each audio file that is analysed
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExcerptSettings {
    #[serde(default = "default_excerpt_start")]
    pub start_s: f32,
    #[serde(default = "default_excerpt_length")]
    pub length_s: f32,
}

impl Default for ExcerptSettings {
    fn default() -> Self {
        Self {
            start_s: default_excerpt_start(),
            length_s: default_excerpt_length(),
        }
    }
}

fn default_excerpt_start() -> f32 {
    DEFAULT_EXCERPT_START
}
fn default_excerpt_length() -> f32 {
    DEFAULT_EXCERPT_LENGTH
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrainingSettings {
    /// Upper bound on the number of tracks sampled for training
    #[serde(default = "default_max_tracks")]
    pub max_tracks: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            max_tracks: default_max_tracks(),
        }
    }
}

fn default_max_tracks() -> usize {
    1000
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SnapshotSettings {
    /// zstd-compress the track payload
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            compress: default_compress(),
        }
    }
}

fn default_compress() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub debug_level: DebugLevel,
}

impl JukeboxSettings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let settings: JukeboxSettings =
            toml::from_str(content).context("Failed to parse TOML config")?;
        if settings.training.max_tracks == 0 {
            anyhow::bail!("training.max_tracks must be > 0");
        }
        settings.analysis.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = JukeboxSettings::from_toml("").unwrap();
        assert_eq!(settings, JukeboxSettings::default());
        assert_eq!(settings.jukebox.method, None);
        assert_eq!(settings.excerpt.start_s, -48.0);
        assert_eq!(settings.excerpt.length_s, 30.0);
        assert_eq!(settings.training.max_tracks, 1000);
        assert!(settings.snapshot.compress);
        assert_eq!(settings.logging.debug_level, DebugLevel::Quiet);
        assert_eq!(settings.analysis, AnalysisConfig::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
            [jukebox]
            method = "mandelellis"
            decoder = "ffmpeg"

            [excerpt]
            start_s = 10.0
            length_s = 20.0

            [training]
            max_tracks = 250

            [snapshot]
            compress = false

            [logging]
            debug_level = 4

            [analysis]
            mfcc_coefficients = 20
        "#;

        let settings = JukeboxSettings::from_toml(toml_str).unwrap();
        assert_eq!(settings.jukebox.method.as_deref(), Some("mandelellis"));
        assert_eq!(settings.jukebox.decoder.as_deref(), Some("ffmpeg"));
        assert_eq!(settings.excerpt.start_s, 10.0);
        assert_eq!(settings.excerpt.length_s, 20.0);
        assert_eq!(settings.training.max_tracks, 250);
        assert!(!settings.snapshot.compress);
        assert_eq!(settings.logging.debug_level, DebugLevel::Debug);
        assert_eq!(settings.analysis.mfcc_coefficients, 20);
        assert_eq!(settings.analysis.mel_bands, 36);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(JukeboxSettings::from_toml("[logging]\ndebug_level = 9").is_err());
        assert!(JukeboxSettings::from_toml("[training]\nmax_tracks = 0").is_err());
        assert!(JukeboxSettings::from_toml("[analysis]\nhop_size = 0").is_err());
        assert!(JukeboxSettings::from_toml("[jukebox\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(JukeboxSettings::load(Path::new("/nonexistent/jukebox.toml")).is_err());
    }
}
