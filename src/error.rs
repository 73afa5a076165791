//! Error types for voxbridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxbridgeError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio errors
    #[error("Failed to decode audio {path}: {message}")]
    AudioDecode { path: String, message: String },

    #[error("Failed to encode audio: {message}")]
    AudioEncode { message: String },

    // Pipeline errors
    #[error("No speech detected or transcription failed")]
    EmptyTranscript,

    #[error("Translation produced no text")]
    EmptyTranslation,

    #[error("Job {request_id} exceeded its deadline during {stage}")]
    DeadlineExceeded { request_id: String, stage: String },

    #[error("Job {request_id} cancelled during {stage}")]
    Cancelled { request_id: String, stage: String },

    #[error("Work queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    // Provider errors (raised outside a chunked stage, e.g. client construction)
    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    // Filesystem watching
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxbridgeError>;
