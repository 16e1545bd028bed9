//! Decoder configuration: tone pair, frame layout and analysis options.
//!
//! All of this is frozen before decoding starts; the decoder derives its
//! working quantities (FFT width, bin weights, step sizes) from a config plus
//! the sample rate of the recording.

use std::str::FromStr;

use crate::error::{Result, TapeError};

/// Window function applied to each FFT frame before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowKind {
    #[default]
    None,
    Bartlett,
    Welch,
    Hann,
}

impl FromStr for WindowKind {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(WindowKind::None),
            "bartlett" => Ok(WindowKind::Bartlett),
            "welch" => Ok(WindowKind::Welch),
            "hann" => Ok(WindowKind::Hann),
            _ => Err(TapeError::InvalidConfig(format!(
                "unknown window {s:?} (expected none, bartlett, welch or hann)"
            ))),
        }
    }
}

/// Which channel of a stereo recording feeds the decoder.
///
/// `Sum` adds the channels without averaging; all downstream thresholds are
/// relative, so the factor of two never matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    Left,
    Right,
    Sum,
}

impl FromStr for Channel {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Ok(Channel::Left),
            "R" => Ok(Channel::Right),
            "A" => Ok(Channel::Sum),
            _ => Err(TapeError::InvalidConfig(format!(
                "unknown channel {s:?} (expected L, R or A)"
            ))),
        }
    }
}

/// Parity declared by the frame layout. The parity bit is skipped over so the
/// cursor lands on the stop bits; it is never verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// UART-style frame layout: one start bit, LSB-first data bits, an optional
/// parity bit, then stop bits. Written in the usual `8N2` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub data_bits: u32,
    pub parity: Parity,
    pub stop_bits: u32,
}

impl FrameFormat {
    pub fn parity_bits(&self) -> u32 {
        match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        }
    }

    /// Total bits per frame, including the start bit.
    pub fn frame_bits(&self) -> u32 {
        1 + self.data_bits + self.parity_bits() + self.stop_bits
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 2,
        }
    }
}

impl FromStr for FrameFormat {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || TapeError::InvalidFrameFormat(s.to_string());
        let mut chars = s.chars();
        let data_bits = chars.next().and_then(|c| c.to_digit(10)).ok_or_else(bad)?;
        let parity = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('N') => Parity::None,
            Some('E') => Parity::Even,
            Some('O') => Parity::Odd,
            _ => return Err(bad()),
        };
        let stop_bits = chars.next().and_then(|c| c.to_digit(10)).ok_or_else(bad)?;
        if chars.next().is_some() {
            return Err(bad());
        }
        Ok(Self {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

/// Everything the decoder needs to know up front.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Frequency of the "0" tone in Hz.
    pub lo_hz: f64,
    /// Frequency of the "1" (carrier) tone in Hz.
    pub hi_hz: f64,
    pub baud: f64,
    pub frame: FrameFormat,
    pub window: WindowKind,
    /// Analysis steps per bit period.
    pub steps: u32,
    pub channel: Channel,
    /// Keep decoded runs shorter than the noise floor of 20 bytes.
    pub keep_all: bool,
    /// Input was resampled to an integer number of samples per bit, so the
    /// tone bins land exactly and the wider sum-of-three rule applies.
    pub assume_resampled: bool,
    /// Collect the raw sampled bit stream alongside the decoded bytes.
    pub emit_bits: bool,
    /// Collect per-step tone balance for plotting; disables bit smoothing.
    pub graph: bool,
    /// Stop ingesting after this many samples.
    pub max_samples: Option<usize>,
}

impl DecoderConfig {
    /// Kansas City Standard: 300 baud, 1200 Hz "0", 2400 Hz "1", 8N2.
    pub fn kcs() -> Self {
        Self {
            lo_hz: 1200.0,
            hi_hz: 2400.0,
            baud: 300.0,
            frame: FrameFormat::default(),
            window: WindowKind::None,
            steps: 8,
            channel: Channel::Left,
            keep_all: false,
            assume_resampled: false,
            emit_bits: false,
            graph: false,
            max_samples: None,
        }
    }

    /// CUTS variant: 1200 baud with 600/1200 Hz tones. A "0" bit is less
    /// than one full low-tone cycle at this rate.
    pub fn cuts() -> Self {
        Self {
            lo_hz: 600.0,
            hi_hz: 1200.0,
            baud: 1200.0,
            ..Self::kcs()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud <= 0.0 {
            return Err(TapeError::InvalidConfig("baud rate must be positive".into()));
        }
        if self.lo_hz <= 0.0 || self.hi_hz <= 0.0 {
            return Err(TapeError::InvalidConfig("tone frequencies must be positive".into()));
        }
        if self.steps == 0 {
            return Err(TapeError::InvalidConfig("steps per bit must be at least 1".into()));
        }
        if !(1..=8).contains(&self.frame.data_bits) {
            return Err(TapeError::InvalidConfig(format!(
                "data bits must be 1-8, got {}",
                self.frame.data_bits
            )));
        }
        if !(1..=8).contains(&self.frame.stop_bits) {
            return Err(TapeError::InvalidConfig(format!(
                "stop bits must be 1-8, got {}",
                self.frame.stop_bits
            )));
        }
        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::kcs()
    }
}
