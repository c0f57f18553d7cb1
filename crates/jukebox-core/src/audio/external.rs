//! ffmpeg subprocess decoder
//!
//! Spawns `ffprobe` to learn the duration and `ffmpeg` to decode the resolved
//! window straight to mono 32-bit float PCM on stdout, avoiding temporary
//! files. Useful for formats the built-in decoders cannot read.

use super::{AudioSource, DecoderError, ExcerptWindow, EXTERNAL_DECODER};
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output, Stdio};

#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    sample_rate: u32,
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }

    /// Use explicit executable paths instead of looking them up in `PATH`
    pub fn with_executables(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    fn run(&self, program: &str, command: &mut Command, path: &Path) -> Result<Output, DecoderError> {
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    DecoderError::Unavailable(format!(
                        "{} not found; install FFmpeg or use the builtin decoder",
                        program
                    ))
                } else {
                    DecoderError::failed(path, format!("failed to spawn {}: {}", program, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecoderError::failed(
                path,
                format!("{} exited with {}: {}", program, output.status, stderr.trim()),
            ));
        }

        Ok(output)
    }
}

impl AudioSource for FfmpegDecoder {
    fn name(&self) -> &'static str {
        EXTERNAL_DECODER
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn probe_duration(&self, path: &Path) -> Result<f32, DecoderError> {
        if !path.exists() {
            return Err(DecoderError::NotFound(path.to_path_buf()));
        }

        let output = self.run(
            &self.ffprobe,
            Command::new(&self.ffprobe)
                .args(["-v", "error", "-show_entries", "format=duration"])
                .args(["-of", "default=noprint_wrappers=1:nokey=1"])
                .arg(path),
            path,
        )?;

        parse_duration(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| DecoderError::failed(path, "ffprobe reported no duration"))
    }

    fn decode(&self, path: &Path, start: f32, length: f32) -> Result<Vec<f32>, DecoderError> {
        let duration = self.probe_duration(path)?;
        let window = ExcerptWindow::resolve(start, length, duration);

        log::debug!(
            "{}: ffmpeg decoding {:.2}s - {:.2}s of {:.2}s",
            path.display(),
            window.start,
            window.end(),
            duration
        );

        let output = self.run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .args(["-v", "error", "-nostdin"])
                .arg("-ss")
                .arg(format!("{:.3}", window.start))
                .arg("-t")
                .arg(format!("{:.3}", window.length))
                .arg("-i")
                .arg(path)
                .args(["-vn", "-ac", "1"])
                .arg("-ar")
                .arg(self.sample_rate.to_string())
                .args(["-f", "f32le", "pipe:1"]),
            path,
        )?;

        Ok(parse_f32le(&output.stdout))
    }
}

fn parse_duration(text: &str) -> Option<f32> {
    text.lines()
        .filter_map(|line| line.trim().parse::<f32>().ok())
        .find(|d| d.is_finite() && *d >= 0.0)
}

/// Raw little-endian f32 PCM; a trailing partial sample is dropped
fn parse_f32le(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
