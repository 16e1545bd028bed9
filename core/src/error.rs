use thiserror::Error;

#[derive(Debug, Error)]
pub enum TapeError {
    #[error("unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannels(u16),

    #[error("waveform contains no samples")]
    EmptyWaveform,

    #[error("invalid frame format {0:?} (expected e.g. 8N2)")]
    InvalidFrameFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FFT error: {0}")]
    FftError(String),
}

pub type Result<T> = std::result::Result<T, TapeError>;
