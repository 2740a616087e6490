//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or running output streams
#[derive(Error, Debug)]
pub enum AudioError {
    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Sample rate conversion to the device rate failed
    #[error("Failed to resample audio: {0}")]
    Resample(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
