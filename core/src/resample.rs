//! Linear-interpolation resampling for the `resample` mode.
//!
//! Rewrites the sample series to an exact integer number of samples per bit,
//! which lets the spectral analyzer place both tone bins on integers and use
//! the wider sum-of-three energy rule.

/// Resample `samples` from `from_hz` to `to_hz` by linear interpolation.
pub fn resample(samples: &[f32], from_hz: f64, to_hz: f64) -> Vec<f32> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_hz / from_hz;
    let out_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src = i as f64 / ratio;
        let idx = src as usize;
        let frac = (src - idx as f64) as f32;
        let value = match samples.get(idx + 1) {
            Some(&next) => samples[idx] * (1.0 - frac) + next * frac,
            None => samples[samples.len() - 1],
        };
        out.push(value);
    }
    out
}
