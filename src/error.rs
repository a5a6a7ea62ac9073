//! Error types for engine setup and capture sources.
//!
//! Nothing here is ever returned from the real-time ingestion path.

use thiserror::Error;

/// Invalid engine configuration, fatal at setup
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("transform size must be a power of two, got {0}")]
    TransformNotPowerOfTwo(usize),

    #[error("transform size {size} outside supported range {min}..={max}")]
    TransformSizeOutOfRange { size: usize, min: usize, max: usize },

    #[error("max bars {requested} outside supported range {min}..={capacity}")]
    BarCapacity {
        requested: usize,
        min: usize,
        capacity: usize,
    },

    #[error("sample rate must be > 0")]
    ZeroSampleRate,

    #[error("channel count must be > 0")]
    ZeroChannels,
}

/// Failure to open or run a capture source
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device found")]
    NoDevice,

    #[error("no input device matching '{0}'")]
    DeviceNotFound(String),

    #[error("device does not support {channels} ch @ {sample_rate} Hz")]
    UnsupportedConfig { sample_rate: u32, channels: u16 },

    #[error("unsupported input sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to query input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query stream configs: {0}")]
    StreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to read WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error("WAV layout {found_rate} Hz / {found_channels} ch does not match engine {rate} Hz / {channels} ch")]
    WavMismatch {
        found_rate: u32,
        found_channels: u16,
        rate: u32,
        channels: u16,
    },
}
