//! Audio resampling using linear interpolation

use anyhow::Result;

/// Resample mono audio to target sample rate using linear interpolation
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        anyhow::bail!("cannot resample from {} Hz to {} Hz", from_rate, to_rate);
    }
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).floor() as usize;

    let output = (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            match (samples.get(src_idx), samples.get(src_idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect();

    Ok(output)
}
