//! Excerpt window selection
//!
//! Callers ask for `length` seconds starting at `start`. The request is
//! normalized against the file duration before decoding:
//! - `length <= 0` or `length >= duration`: the whole file
//! - `start < 0`: a window centered in the file, starting no later than `-start`
//! - `start + length > duration`: the window is shifted onto the file's tail

use std::ops::Range;

/// A resolved excerpt, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcerptWindow {
    pub start: f32,
    pub length: f32,
}

impl ExcerptWindow {
    /// Normalize a requested window against the file duration
    pub fn resolve(start: f32, length: f32, duration: f32) -> Self {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let start = if start.is_finite() { start } else { 0.0 };

        if !(length > 0.0) || length >= duration {
            return Self {
                start: 0.0,
                length: duration,
            };
        }

        if start < 0.0 {
            Self {
                start: (-start).min((duration - length) / 2.0),
                length,
            }
        } else if start + length > duration {
            let start = (duration - length).max(0.0);
            Self {
                start,
                length: duration - start,
            }
        } else {
            Self { start, length }
        }
    }

    pub fn end(&self) -> f32 {
        self.start + self.length
    }

    /// Sample indices covered by the window, clamped to `total` samples
    pub fn sample_range(&self, sample_rate: u32, total: usize) -> Range<usize> {
        let rate = sample_rate as f64;
        let start = ((self.start as f64 * rate).round() as usize).min(total);
        let end = ((self.end() as f64 * rate).round() as usize).clamp(start, total);
        start..end
    }
}
