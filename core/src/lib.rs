//! Cassette tape decoder for Kansas City Standard FSK recordings
//!
//! Recovers byte streams from audio recordings of vintage-computer cassette
//! tapes (KCS and relatives: UK101, BBC Micro, Atari 400/800, and the denser
//! CUTS variant). The pipeline slides an FFT window across the samples,
//! classifies each position as low or high tone against adaptive class
//! averages, smooths glitches out of the resulting bit timeline, then runs a
//! UART-style frame decoder that locks onto start bits, tracks tape-speed
//! drift per frame, and splits the byte stream into files at carrier gaps.

pub mod bits;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ingest;
pub mod resample;
pub mod spectrum;
pub mod threshold;

pub use config::{Channel, DecoderConfig, FrameFormat, Parity, WindowKind};
pub use decoder::{DecodeOutput, DecodeReport, Decoder, SpeedReset, StopBitError};
pub use error::{Result, TapeError};
pub use ingest::reduce_channels;
pub use resample::resample;

/// Decoded runs shorter than this are noise between programs, not files.
pub const MIN_FILE_BYTES: usize = 20;

/// Frame-to-frame speed deviation tolerated before the tracked widths reset.
pub const SPEED_TOLERANCE: f64 = 0.20;

/// Carrier gap, in frame widths, that splits the stream into separate files.
/// Tapes conventionally carry at least ten frames of carrier between
/// programs.
pub const FILE_GAP_FRAMES: f64 = 11.0;

/// Edge steps are trimmed while both energies sit below the global mean
/// divided by this.
pub const TRIM_DIVISOR: f64 = 10.0;

/// Maximum refinement passes for the adaptive thresholds.
pub const REFINE_PASSES: usize = 5;

/// Smallest share of steps either tone class may hold after refinement.
pub const CLASS_FLOOR: f64 = 0.08;
