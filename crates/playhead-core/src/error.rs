//! Error types for Playhead Core

use crate::types::TrackKind;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
#[derive(Error, Debug)]
pub enum Error {
    // Selection errors
    #[error("{kind} track index {index} out of bounds (catalog has {len})")]
    TrackIndexOutOfBounds {
        kind: TrackKind,
        index: usize,
        len: usize,
    },

    // Streaming session errors
    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Streaming session already terminated")]
    SessionTerminated,

    // Subtitle errors
    #[error("Failed to fetch subtitle: {0}")]
    SubtitleFetch(String),

    #[error("Subtitle fetch timed out after {timeout_ms}ms")]
    SubtitleTimeout { timeout_ms: u64 },

    // Manifest errors
    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No async runtime available to run subtitle resolutions")]
    RuntimeUnavailable,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a subtitle fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Error::SubtitleFetch(msg.into())
    }

    /// Returns true if retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SubtitleFetch(_) | Error::SubtitleTimeout { .. } | Error::Network(_)
        )
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::TrackIndexOutOfBounds { .. } => "TRACK_OUT_OF_BOUNDS",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::SessionTerminated => "SESSION_TERMINATED",
            Error::SubtitleFetch(_) => "SUBTITLE_FETCH",
            Error::SubtitleTimeout { .. } => "SUBTITLE_TIMEOUT",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::RuntimeUnavailable => "RUNTIME_UNAVAILABLE",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_message() {
        let err = Error::TrackIndexOutOfBounds {
            kind: TrackKind::Audio,
            index: 3,
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "audio track index 3 out of bounds (catalog has 3)"
        );
        assert_eq!(err.error_code(), "TRACK_OUT_OF_BOUNDS");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_fetch_errors_are_recoverable() {
        assert!(Error::fetch("503").is_recoverable());
        assert!(Error::SubtitleTimeout { timeout_ms: 100 }.is_recoverable());
        assert!(!Error::SessionTerminated.is_recoverable());
    }
}
