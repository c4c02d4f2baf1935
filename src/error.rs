//! Error types for clinscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio input errors
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    // Recognition engine errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription inference failed: {message}")]
    TranscriptionInferenceFailed { message: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Diarization / identity errors
    #[error("Diarization failed: {message}")]
    Diarization { message: String },

    #[error("Speaker identity match failed: {message}")]
    IdentityMatch { message: String },

    // Engine pool errors
    #[error("No recognition engine could be loaded; the engine pool is unavailable")]
    PoolUnavailable,

    #[error("Timed out after {waited_ms}ms waiting for a free recognition engine")]
    AcquireTimeout { waited_ms: u64 },

    // Scheduler errors
    #[error("Job panicked: {message}")]
    JobPanicked { message: String },

    #[error("Job scheduler has been shut down")]
    SchedulerStopped,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ScribeError {
    /// Shorthand for a [`ScribeError::ConfigInvalidValue`].
    pub fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        ScribeError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeError>;
