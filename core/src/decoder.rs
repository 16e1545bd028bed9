//! Frame-synchronous decoding of the bit timeline into per-file byte streams.
//!
//! The decoder walks the timeline looking for start bits, samples data bits
//! at mid-bit offsets with a bit width that tracks tape speed frame by frame,
//! and splits the byte stream into files at long carrier gaps.

use crate::bits::{build_timeline, smooth};
use crate::config::DecoderConfig;
use crate::error::{Result, TapeError};
use crate::spectrum::{fft_width, SpectralAnalyzer, ToneBin};
use crate::threshold::{refine_thresholds, trim_edges, RefinePass};
use crate::{FILE_GAP_FRAMES, MIN_FILE_BYTES, SPEED_TOLERANCE};

/// A stop bit that sampled low at decode time. The byte is kept; the offset
/// points back into the original recording for inspection.
#[derive(Debug, Clone, Copy)]
pub struct StopBitError {
    /// Which stop bit within the frame, 1-based.
    pub stop_index: u32,
    /// Approximate sample offset in the source recording.
    pub sample_offset: usize,
}

/// A frame that arrived outside the speed tolerance, forcing the tracked
/// widths back to their configured values.
#[derive(Debug, Clone, Copy)]
pub struct SpeedReset {
    /// Timeline step of the offending start bit.
    pub step: usize,
    /// Observed gap in configured frame widths.
    pub gap_frames: f64,
}

/// Counters and events accumulated across one decode run.
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub total_samples: usize,
    /// Timeline length after trimming.
    pub steps: usize,
    pub trimmed_head: usize,
    pub trimmed_tail: usize,
    pub refine_passes: Vec<RefinePass>,
    pub thresholds_reverted: bool,
    pub avlo: f64,
    pub avhi: f64,
    pub frames: usize,
    /// Largest in-tolerance speed deviation seen at a frame boundary.
    pub max_variance: f64,
    pub stop_bit_errors: Vec<StopBitError>,
    pub speed_resets: Vec<SpeedReset>,
    /// Timeline steps where a carrier gap closed one file and opened another.
    pub file_breaks: Vec<usize>,
}

/// Everything one decode run produces.
#[derive(Debug, Default)]
pub struct DecodeOutput {
    /// One byte vector per detected recording.
    pub files: Vec<Vec<u8>>,
    /// ASCII '0'/'1' stream of sampled bits, when enabled.
    pub bit_stream: Option<String>,
    /// Per-step tone balance `100 * (hi/avhi - lo/avlo)`, when enabled.
    pub graph: Option<Vec<(usize, f64)>>,
    pub report: DecodeReport,
}

/// Round to nearest by `+0.5` truncation. Every bit-position computation
/// must round the same way or byte output stops being reproducible.
#[inline]
fn nearest(x: f64) -> usize {
    (x + 0.5) as usize
}

/// Timeline access past the trimmed end reads as silence.
#[inline]
fn bit(timeline: &[u8], index: usize) -> u8 {
    timeline.get(index).copied().unwrap_or(0)
}

/// A configured decoder with its derived layout and FFT plan, reusable
/// across recordings with the same sample rate.
pub struct Decoder {
    config: DecoderConfig,
    samples_per_bit: usize,
    step: usize,
    bit_width: f64,
    frame_bits: u32,
    frame_width: f64,
    width: usize,
    lo_bin: ToneBin,
    hi_bin: ToneBin,
    analyzer: SpectralAnalyzer,
}

impl Decoder {
    pub fn new(config: DecoderConfig, sample_rate: f64) -> Result<Self> {
        config.validate()?;
        let samples_per_bit_f = sample_rate / config.baud;
        if samples_per_bit_f < 1.0 {
            return Err(TapeError::InvalidConfig(format!(
                "sample rate {sample_rate} Hz is below the baud rate {}",
                config.baud
            )));
        }
        if config.hi_hz > sample_rate / 2.0 {
            return Err(TapeError::InvalidConfig(format!(
                "high tone {} Hz is above Nyquist for {sample_rate} Hz",
                config.hi_hz
            )));
        }

        let step = nearest(samples_per_bit_f / config.steps as f64).max(1);
        let bit_width = samples_per_bit_f / step as f64;
        let frame_bits = config.frame.frame_bits();
        let width = fft_width(sample_rate, config.baud, config.lo_hz);
        let lo_bin = ToneBin::place(config.lo_hz, width, sample_rate);
        let hi_bin = ToneBin::place(config.hi_hz, width, sample_rate);
        let sum3 = config.assume_resampled && lo_bin.is_integral() && hi_bin.is_integral();
        let analyzer =
            SpectralAnalyzer::new(width, step, config.window, lo_bin, hi_bin, sum3);

        Ok(Self {
            samples_per_bit: nearest(samples_per_bit_f),
            step,
            bit_width,
            frame_bits,
            frame_width: bit_width * frame_bits as f64,
            width,
            lo_bin,
            hi_bin,
            analyzer,
            config,
        })
    }

    pub fn samples_per_bit(&self) -> usize {
        self.samples_per_bit
    }

    /// Hop between FFT windows, in samples.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Bit duration in timeline steps.
    pub fn bit_width(&self) -> f64 {
        self.bit_width
    }

    /// Frame duration in timeline steps.
    pub fn frame_width(&self) -> f64 {
        self.frame_width
    }

    pub fn fft_width(&self) -> usize {
        self.width
    }

    pub fn lo_bin(&self) -> ToneBin {
        self.lo_bin
    }

    pub fn hi_bin(&self) -> ToneBin {
        self.hi_bin
    }

    /// Run the full pipeline: spectral analysis, trim, thresholds, bit
    /// timeline, frame decoding.
    pub fn decode(&self, samples: &[f32]) -> Result<DecodeOutput> {
        let mut report = DecodeReport {
            total_samples: samples.len(),
            ..Default::default()
        };

        let (mut lo, mut hi) = self.analyzer.analyze(samples)?;
        let trim = trim_edges(&mut lo, &mut hi);
        report.trimmed_head = trim.head;
        report.trimmed_tail = trim.tail;
        report.steps = lo.len();

        if lo.is_empty() {
            return Ok(DecodeOutput {
                files: Vec::new(),
                bit_stream: self.config.emit_bits.then(String::new),
                graph: self.config.graph.then(Vec::new),
                report,
            });
        }

        let thresholds = refine_thresholds(&lo, &hi);
        report.refine_passes = thresholds.passes.clone();
        report.thresholds_reverted = thresholds.reverted;
        report.avlo = thresholds.avlo;
        report.avhi = thresholds.avhi;

        let mut timeline = build_timeline(&lo, &hi, &thresholds);
        let graph = self.config.graph.then(|| {
            lo.iter()
                .zip(&hi)
                .enumerate()
                .map(|(i, (&l, &h))| {
                    let balance =
                        100.0 * ((h as f64) / thresholds.avhi - (l as f64) / thresholds.avlo);
                    (i, balance)
                })
                .collect()
        });
        // The raw timeline is more informative on a plot; only smooth when
        // the bits feed the frame decoder alone.
        if !self.config.graph {
            smooth(&mut timeline, self.config.steps);
        }

        let (files, bit_stream) = self.decode_frames(&timeline, &mut report);

        Ok(DecodeOutput {
            files,
            bit_stream,
            graph,
            report,
        })
    }

    /// Timeline step offset of the 1-based `i`-th stop bit from the start
    /// bit, at the current tracked bit width.
    fn stop_offset(&self, i: u32, bit_w: f64) -> usize {
        let frame = &self.config.frame;
        nearest((frame.data_bits + frame.parity_bits() + i) as f64 * bit_w)
    }

    fn decode_frames(
        &self,
        timeline: &[u8],
        report: &mut DecodeReport,
    ) -> (Vec<Vec<u8>>, Option<String>) {
        let steps = timeline.len();
        let frame = &self.config.frame;
        let data_bits = frame.data_bits;
        let parity_bits = frame.parity_bits();
        let stop_bits = frame.stop_bits;

        let mut p = 0usize;
        let mut last = 0usize;
        let mut bit_w = self.bit_width;
        let mut frame_w = self.frame_width;
        let mut text: Vec<u8> = Vec::new();
        let mut files: Vec<Vec<u8>> = Vec::new();
        let mut stream = self.config.emit_bits.then(String::new);

        while (p as f64) < steps as f64 - frame_w {
            // Skip carrier to the next candidate start bit, rendering the
            // run as whole bit widths of '1'.
            let mut run = 0usize;
            while p < steps && timeline[p] == 1 {
                p += 1;
                run += 1;
            }
            if let Some(s) = stream.as_mut() {
                for _ in 0..((run as f64 / bit_w) as usize) {
                    s.push('1');
                }
            }

            // Centre on the start bit; a high sample here means we latched
            // onto a glitch, so resume the hunt from where we stand.
            p += nearest(bit_w / 2.0);
            if p >= steps {
                break;
            }
            if bit(timeline, p) != 0 {
                continue;
            }

            // After a long gap, demand clean stop bits where this frame
            // would have them before trusting the start bit.
            if (p - last) as f64 > 2.0 * frame_w {
                let stops_ok = (1..=stop_bits)
                    .all(|i| bit(timeline, p + self.stop_offset(i, bit_w)) == 1);
                if !stops_ok {
                    continue;
                }
            }

            // Track tape speed: adopt the observed frame width when it is
            // within tolerance, otherwise snap back to the configured one.
            let gap = (p - last) as f64;
            let variance = (gap - self.frame_width).abs() / self.frame_width;
            if variance < SPEED_TOLERANCE {
                frame_w = gap;
                bit_w = frame_w / self.frame_bits as f64;
                if variance > report.max_variance {
                    report.max_variance = variance;
                }
            } else {
                frame_w = self.frame_width;
                bit_w = self.bit_width;
                report.speed_resets.push(SpeedReset {
                    step: p,
                    gap_frames: gap / self.frame_width,
                });
                if gap > FILE_GAP_FRAMES * self.frame_width {
                    Self::flush(&mut text, &mut files, self.config.keep_all);
                    report.file_breaks.push(p);
                }
            }

            if let Some(s) = stream.as_mut() {
                for i in 0..(data_bits + stop_bits) {
                    let sampled = bit(timeline, p + nearest(bit_w * i as f64));
                    s.push(if sampled == 1 { '1' } else { '0' });
                }
            }

            // Assemble the byte, LSB first, sampling each data bit mid-bit.
            let mut byte = 0u8;
            for i in 1..=data_bits {
                if bit(timeline, p + nearest(bit_w * i as f64)) == 1 {
                    byte |= 1 << (i - 1);
                }
            }
            text.push(byte);
            report.frames += 1;

            // Stop bits are a diagnostic, not a gate: log and keep the byte.
            for i in 1..=stop_bits {
                let offset = self.stop_offset(i, bit_w);
                if bit(timeline, p + offset) != 1 {
                    report.stop_bit_errors.push(StopBitError {
                        stop_index: i,
                        sample_offset: (report.trimmed_head + p + offset) * self.step,
                    });
                }
            }

            // Leave the cursor in the middle of the first stop bit, ready
            // for the next start-bit hunt.
            last = p;
            p += nearest((1 + data_bits + parity_bits) as f64 * bit_w);
        }

        Self::flush(&mut text, &mut files, self.config.keep_all);
        (files, stream)
    }

    /// Close the in-progress byte collection: runs below the noise floor are
    /// discarded unless everything is kept.
    fn flush(text: &mut Vec<u8>, files: &mut Vec<Vec<u8>>, keep_all: bool) {
        if !text.is_empty() && (text.len() >= MIN_FILE_BYTES || keep_all) {
            files.push(std::mem::take(text));
        }
        text.clear();
    }
}
