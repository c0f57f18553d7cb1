//! Short-time spectral analysis
//!
//! Splits mono PCM into overlapping Hann-windowed frames and computes, per
//! frame, the mel-frequency cepstrum plus a handful of scalar spectral
//! descriptors. Similarity methods build their summaries from the result.

mod mel;

pub use mel::{hz_to_mel, mel_to_hz, MelFilterbank};

use crate::config::AnalysisConfig;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Scalar descriptors of a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDescriptors {
    /// Magnitude-weighted mean frequency, normalized by Nyquist
    pub centroid: f32,
    /// Frequency below which `rolloff_fraction` of the power lies, normalized by Nyquist
    pub rolloff: f32,
    /// L2 norm of the positive change of the normalized magnitude spectrum
    pub flux: f32,
    /// Geometric over arithmetic mean of the power spectrum
    pub flatness: f32,
    /// Zero crossings per sample
    pub zcr: f32,
    pub rms: f32,
}

impl FrameDescriptors {
    pub const COUNT: usize = 6;

    pub fn to_array(&self) -> [f32; Self::COUNT] {
        [
            self.centroid,
            self.rolloff,
            self.flux,
            self.flatness,
            self.zcr,
            self.rms,
        ]
    }
}

/// Per-frame analysis of a PCM buffer
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    /// Cepstral coefficients [frame][coefficient]
    pub mfcc: Vec<Vec<f32>>,
    pub descriptors: Vec<FrameDescriptors>,
}

impl FrameAnalysis {
    pub fn num_frames(&self) -> usize {
        self.mfcc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mfcc.is_empty()
    }
}

/// Reusable analyzer; cheap to clone and safe to share between threads
#[derive(Clone)]
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Arc<Vec<f32>>,
    filterbank: Arc<MelFilterbank>,
    dct: Arc<Vec<Vec<f32>>>,
    frame_size: usize,
    hop_size: usize,
    rolloff_fraction: f32,
    log_floor: f32,
}

impl SpectralAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.frame_size);

        Self {
            fft,
            window: Arc::new(create_hann_window(config.frame_size)),
            filterbank: Arc::new(MelFilterbank::new(config)),
            dct: Arc::new(create_dct_matrix(config.mfcc_coefficients, config.mel_bands)),
            frame_size: config.frame_size,
            hop_size: config.hop_size,
            rolloff_fraction: config.rolloff_fraction,
            log_floor: config.log_floor,
        }
    }

    /// Number of complete frames in `num_samples` samples
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples < self.frame_size {
            0
        } else {
            1 + (num_samples - self.frame_size) / self.hop_size
        }
    }

    pub fn analyze(&self, samples: &[f32]) -> FrameAnalysis {
        let num_frames = self.num_frames(samples.len());
        let num_bins = self.frame_size / 2 + 1;

        let mut mfcc = Vec::with_capacity(num_frames);
        let mut descriptors = Vec::with_capacity(num_frames);

        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.frame_size];
        let mut magnitudes = vec![0.0f32; num_bins];
        let mut power = vec![0.0f32; num_bins];
        let mut previous: Option<Vec<f32>> = None;

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_size;
            let frame = &samples[start..start + self.frame_size];

            for (slot, (&s, &w)) in buffer.iter_mut().zip(frame.iter().zip(self.window.iter())) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut buffer);

            for (k, c) in buffer.iter().take(num_bins).enumerate() {
                power[k] = c.norm_sqr();
                magnitudes[k] = power[k].sqrt();
            }

            mfcc.push(self.cepstrum(&power));

            let normalized = normalize_l1(&magnitudes);
            let flux = previous
                .as_ref()
                .map(|prev| positive_flux(prev, &normalized))
                .unwrap_or(0.0);
            previous = Some(normalized);

            descriptors.push(FrameDescriptors {
                centroid: spectral_centroid(&magnitudes),
                rolloff: spectral_rolloff(&power, self.rolloff_fraction),
                flux,
                flatness: spectral_flatness(&power, self.log_floor),
                zcr: zero_crossing_rate(frame),
                rms: rms(frame),
            });
        }

        FrameAnalysis { mfcc, descriptors }
    }

    fn cepstrum(&self, power: &[f32]) -> Vec<f32> {
        let log_mel: Vec<f32> = self
            .filterbank
            .apply(power)
            .into_iter()
            .map(|e| e.max(self.log_floor).ln())
            .collect();

        self.dct
            .iter()
            .map(|row| row.iter().zip(&log_mel).map(|(c, x)| c * x).sum())
            .collect()
    }
}

/// Create Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

/// Orthonormal DCT-II basis, `coefficients` rows of `bands` values
fn create_dct_matrix(coefficients: usize, bands: usize) -> Vec<Vec<f32>> {
    let n = bands as f32;
    (0..coefficients)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..bands)
                .map(|m| scale * (PI * k as f32 * (m as f32 + 0.5) / n).cos())
                .collect()
        })
        .collect()
}

fn normalize_l1(values: &[f32]) -> Vec<f32> {
    let total: f32 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}

fn positive_flux(previous: &[f32], current: &[f32]) -> f32 {
    previous
        .iter()
        .zip(current)
        .map(|(p, c)| (c - p).max(0.0).powi(2))
        .sum::<f32>()
        .sqrt()
}

fn spectral_centroid(magnitudes: &[f32]) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let last = (magnitudes.len() - 1) as f32;
    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, m)| k as f32 * m)
        .sum();
    weighted / total / last
}

fn spectral_rolloff(power: &[f32], fraction: f32) -> f32 {
    let total: f32 = power.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = fraction * total;
    let last = (power.len() - 1) as f32;

    let mut cumulative = 0.0;
    for (k, p) in power.iter().enumerate() {
        cumulative += p;
        if cumulative >= threshold {
            return k as f32 / last;
        }
    }
    1.0
}

fn spectral_flatness(power: &[f32], floor: f32) -> f32 {
    let mean = power.iter().sum::<f32>() / power.len() as f32;
    if mean <= floor {
        return 0.0;
    }
    let log_mean = power.iter().map(|p| p.max(floor).ln()).sum::<f32>() / power.len() as f32;
    (log_mean.exp() / mean).clamp(0.0, 1.0)
}

fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() - 1) as f32
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}
