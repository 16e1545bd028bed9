//! Short-time spectral analysis of the sample series.
//!
//! A fixed-width window slides across the samples; each position yields one
//! power spectrum from which two scalar energies are read, one near the low
//! tone and one near the high tone. Absolute scale never matters downstream,
//! only ratios against the adaptive class averages.

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::config::WindowKind;
use crate::error::{Result, TapeError};

/// Largest power of two no wider than one bit period, doubled when the low
/// tone runs below the baud rate so a full low-tone cycle still fits the
/// window (the CUTS case, where a "0" bit is a sub-cycle burst).
pub fn fft_width(sample_rate: f64, baud: f64, lo_hz: f64) -> usize {
    let samples_per_bit = sample_rate / baud;
    let mut width = 1usize;
    while (width * 2) as f64 <= samples_per_bit {
        width *= 2;
    }
    if lo_hz < baud {
        width *= 2;
    }
    width
}

/// Placement of one tone on the power spectrum: the two straddling bins and
/// their linear interpolation weights.
#[derive(Debug, Clone, Copy)]
pub struct ToneBin {
    pub n1: usize,
    pub n2: usize,
    pub a1: f32,
    pub a2: f32,
    fraction: f64,
}

impl ToneBin {
    pub fn place(tone_hz: f64, width: usize, sample_rate: f64) -> Self {
        let bin = tone_hz * width as f64 / sample_rate;
        let n1 = bin as usize;
        let mut a1 = (n1 + 1) as f64 - bin;
        let mut a2 = 1.0 - a1;
        if n1 == 0 {
            // Bin 0 is DC; put all the weight on the upper neighbour.
            a1 = 0.0;
            a2 = 1.0;
        }
        let n2 = (n1 + 1).min(width / 2);
        Self {
            n1,
            n2,
            a1: a1 as f32,
            a2: a2 as f32,
            fraction: bin - n1 as f64,
        }
    }

    /// True when the tone lands exactly on a bin centre.
    pub fn is_integral(&self) -> bool {
        self.fraction == 0.0
    }
}

/// Scale the window function onto one FFT frame in place.
pub fn apply_window(kind: WindowKind, frame: &mut [f32]) {
    let len = frame.len();
    if len < 2 || kind == WindowKind::None {
        return;
    }
    let half = (len - 1) as f32 / 2.0;
    match kind {
        WindowKind::None => unreachable!(),
        WindowKind::Bartlett => {
            for (n, v) in frame.iter_mut().enumerate() {
                *v *= 1.0 - ((n as f32 - half) / half).abs();
            }
        }
        WindowKind::Welch => {
            for (n, v) in frame.iter_mut().enumerate() {
                let x = (n as f32 - half) / half;
                *v *= 1.0 - x * x;
            }
        }
        WindowKind::Hann => {
            let scale = 2.0 * std::f32::consts::PI / (len - 1) as f32;
            for (n, v) in frame.iter_mut().enumerate() {
                *v *= 0.5 * (1.0 - (scale * n as f32).cos());
            }
        }
    }
}

/// Sliding-window analyzer with a single FFT plan reused across all steps.
pub struct SpectralAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    width: usize,
    step: usize,
    window: WindowKind,
    lo: ToneBin,
    hi: ToneBin,
    /// Sum three adjacent bins instead of interpolating two. Only valid when
    /// both tones land exactly on bin centres.
    sum3: bool,
}

impl SpectralAnalyzer {
    pub fn new(
        width: usize,
        step: usize,
        window: WindowKind,
        lo: ToneBin,
        hi: ToneBin,
        sum3: bool,
    ) -> Self {
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(width);
        Self {
            fft,
            width,
            step,
            window,
            lo,
            hi,
            sum3,
        }
    }

    /// Slide across `samples`, producing one (lo, hi) energy pair per step.
    ///
    /// Returns empty series when the input is shorter than one window.
    pub fn analyze(&self, samples: &[f32]) -> Result<(Vec<f32>, Vec<f32>)> {
        if samples.len() < self.width {
            return Ok((Vec::new(), Vec::new()));
        }
        let count = (samples.len() - self.width) / self.step + 1;
        let mut lo = Vec::with_capacity(count);
        let mut hi = Vec::with_capacity(count);

        let mut frame = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut power = vec![0.0f32; self.width / 2 + 1];

        for i in 0..count {
            let start = i * self.step;
            frame.copy_from_slice(&samples[start..start + self.width]);
            apply_window(self.window, &mut frame);
            self.fft
                .process(&mut frame, &mut spectrum)
                .map_err(|e| TapeError::FftError(e.to_string()))?;
            for (p, c) in power.iter_mut().zip(spectrum.iter()) {
                *p = c.norm_sqr();
            }
            lo.push(self.tone_energy(&self.lo, &power));
            hi.push(self.tone_energy(&self.hi, &power));
        }
        Ok((lo, hi))
    }

    fn tone_energy(&self, bin: &ToneBin, power: &[f32]) -> f32 {
        if self.sum3 {
            // Both tones sit exactly on bin centres; sum whichever
            // neighbours stay inside the spectrum.
            let mut energy = power[bin.n1];
            if bin.n1 >= 1 {
                energy += power[bin.n1 - 1];
            }
            if bin.n1 + 1 < power.len() {
                energy += power[bin.n1 + 1];
            }
            energy
        } else {
            bin.a1 * power[bin.n1] + bin.a2 * power[bin.n2]
        }
    }
}
