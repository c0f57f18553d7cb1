//! Audio decoding adapters
//!
//! The similarity core only consumes mono PCM. Getting there from an encoded
//! file is the job of an [`AudioSource`]: either the pure-Rust built-in
//! decoders or an external ffmpeg process, chosen when the jukebox is powered
//! on. Which ones exist depends on the enabled cargo features.

#[cfg(feature = "builtin-decoder")]
mod container;
#[cfg(feature = "builtin-decoder")]
mod decoder;
mod excerpt;
#[cfg(feature = "external-decoder")]
mod external;
mod resample;

#[cfg(feature = "builtin-decoder")]
pub use decoder::{decode_audio, BuiltinDecoder};
pub use excerpt::ExcerptWindow;
#[cfg(feature = "external-decoder")]
pub use external::FfmpegDecoder;
pub use resample::resample_to_target;

use crate::error::{JukeboxError, JukeboxResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Name of the pure-Rust decoder
pub const BUILTIN_DECODER: &str = "builtin";

/// Name of the ffmpeg subprocess decoder
pub const EXTERNAL_DECODER: &str = "ffmpeg";

/// Errors raised by decoder adapters
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("audio file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported audio format: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("decoder unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode {}: {reason}", .path.display())]
    Failed { path: PathBuf, reason: String },
}

impl DecoderError {
    pub(crate) fn failed(path: &Path, reason: impl Into<String>) -> Self {
        DecoderError::Failed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Supplies mono PCM at a fixed sample rate for a window of an audio file
pub trait AudioSource: Send + Sync {
    /// Registry name of this decoder
    fn name(&self) -> &'static str;

    /// Sample rate of the PCM returned by [`AudioSource::decode`]
    fn sample_rate(&self) -> u32;

    /// Duration of the file in seconds
    fn probe_duration(&self, path: &Path) -> Result<f32, DecoderError>;

    /// Decode `length` seconds starting at `start`, normalized through
    /// [`ExcerptWindow::resolve`]
    fn decode(&self, path: &Path, start: f32, length: f32) -> Result<Vec<f32>, DecoderError>;
}

/// Decoded audio data
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let frames = samples.len() as f64 / channels.max(1) as f64;
        let duration_ms = if sample_rate > 0 {
            (frames / sample_rate as f64 * 1000.0) as u32
        } else {
            0
        };
        Self {
            samples,
            sample_rate,
            channels,
            duration_ms,
        }
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    }

    /// Duration in seconds, derived from the sample count
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

/// Supported audio and container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    // Pure audio formats
    Wav,
    Mp3,
    Flac,
    Ogg,

    // Container formats (first audio track is used)
    Mp4,
    Mkv,
    Mov,
    Webm,

    Unknown,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,

            Some("mp4") | Some("m4a") | Some("m4b") | Some("aac") => AudioFormat::Mp4,
            Some("mkv") | Some("mka") => AudioFormat::Mkv,
            Some("mov") => AudioFormat::Mov,
            Some("webm") => AudioFormat::Webm,

            _ => AudioFormat::Unknown,
        }
    }

    /// Check if format is a multi-track container
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            AudioFormat::Mp4 | AudioFormat::Mkv | AudioFormat::Mov | AudioFormat::Webm
        )
    }
}

/// Whether a path looks like a file one of the decoders can handle
pub fn is_audio_file(path: &Path) -> bool {
    path.is_file() && AudioFormat::from_path(path) != AudioFormat::Unknown
}

/// Names of the decoders compiled into this build, preferred one first
pub fn available_decoders() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "builtin-decoder")]
    names.push(BUILTIN_DECODER);
    #[cfg(feature = "external-decoder")]
    names.push(EXTERNAL_DECODER);
    names
}

/// Instantiate a decoder by name
#[cfg_attr(
    not(any(feature = "builtin-decoder", feature = "external-decoder")),
    allow(unused_variables)
)]
pub fn create_decoder(name: &str, sample_rate: u32) -> JukeboxResult<Arc<dyn AudioSource>> {
    match name {
        #[cfg(feature = "builtin-decoder")]
        BUILTIN_DECODER => Ok(Arc::new(BuiltinDecoder::new(sample_rate))),
        #[cfg(feature = "external-decoder")]
        EXTERNAL_DECODER => Ok(Arc::new(FfmpegDecoder::new(sample_rate))),
        other => Err(JukeboxError::UnknownDecoder(other.to_string())),
    }
}

/// The built-in decoder when compiled in, otherwise the external fallback
pub fn default_decoder(sample_rate: u32) -> Option<Arc<dyn AudioSource>> {
    available_decoders()
        .first()
        .and_then(|name| create_decoder(name, sample_rate).ok())
}
