use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown model: {requested}. Available: [{available}]")]
    UnknownModel { requested: String, available: String },

    #[error("Video not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Video has no audio track: {}", .0.display())]
    NoAudioTrack(PathBuf),

    #[error("Model {model} requires an audio track, but the video has none")]
    AudioRequired { model: String },

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Audio extraction for {video} failed: {reason}")]
    AudioExtractionFailed { video: String, reason: String },

    #[error("Model service request timed out after {timeout_secs}s ({model})")]
    InferenceTimeout { model: String, timeout_secs: u64 },

    #[error("Model service error: {status} - {body}")]
    BackendError { status: u16, body: String },

    #[error("Model service unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Model service returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Failed to persist caption: {0}")]
    PersistenceFailed(String),

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid video filename: {0}")]
    InvalidFilename(String),

    #[error("{0}")]
    VideoConstraint(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CaptionError>;
