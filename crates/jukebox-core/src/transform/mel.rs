//! Triangular mel filterbank

use crate::config::AnalysisConfig;

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// One triangular filter, stored sparsely from its first non-zero bin
#[derive(Debug, Clone)]
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// Maps a power spectrum onto `mel_bands` energies
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
}

impl MelFilterbank {
    pub fn new(config: &AnalysisConfig) -> Self {
        let num_bins = config.spectrum_bins();
        let bin_hz = config.sample_rate as f32 / config.frame_size as f32;

        let mel_min = hz_to_mel(config.mel_min_hz);
        let mel_max = hz_to_mel(config.mel_max_hz);
        let step = (mel_max - mel_min) / (config.mel_bands + 1) as f32;
        let edges: Vec<f32> = (0..config.mel_bands + 2)
            .map(|i| mel_to_hz(mel_min + step * i as f32))
            .collect();

        let filters = edges
            .windows(3)
            .map(|w| {
                let (lo, center, hi) = (w[0], w[1], w[2]);
                let mut start_bin = None;
                let mut weights = Vec::new();

                for k in 0..num_bins {
                    let f = k as f32 * bin_hz;
                    let weight = if f > lo && f <= center {
                        (f - lo) / (center - lo)
                    } else if f > center && f < hi {
                        (hi - f) / (hi - center)
                    } else {
                        0.0
                    };

                    if weight > 0.0 {
                        start_bin.get_or_insert(k);
                        weights.push(weight);
                    } else if start_bin.is_some() {
                        break;
                    }
                }

                MelFilter {
                    start_bin: start_bin.unwrap_or(0),
                    weights,
                }
            })
            .collect();

        Self { filters }
    }

    pub fn num_bands(&self) -> usize {
        self.filters.len()
    }

    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                power
                    .iter()
                    .skip(filter.start_bin)
                    .zip(&filter.weights)
                    .map(|(p, w)| p * w)
                    .sum()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mel_scale_round_trip() {
        assert_relative_eq!(hz_to_mel(0.0), 0.0);
        assert_relative_eq!(hz_to_mel(1000.0), 1000.0, epsilon = 0.5);
        for hz in [20.0, 440.0, 4000.0, 11025.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_default_filterbank_covers_every_band() {
        let config = AnalysisConfig::default();
        let bank = MelFilterbank::new(&config);
        assert_eq!(bank.num_bands(), config.mel_bands);
        assert!(bank.filters.iter().all(|f| !f.weights.is_empty()));

        // Filters are ordered by frequency
        let starts: Vec<usize> = bank.filters.iter().map(|f| f.start_bin).collect();
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_apply_selects_band() {
        let config = AnalysisConfig::default();
        let bank = MelFilterbank::new(&config);

        // A single bin of energy only excites the filters that contain it
        let mut power = vec![0.0; config.spectrum_bins()];
        power[100] = 1.0;
        let energies = bank.apply(&power);
        let excited = energies.iter().filter(|&&e| e > 0.0).count();
        assert!((1..=2).contains(&excited));
        assert!(energies.iter().all(|&e| e <= 1.0));
    }
}
