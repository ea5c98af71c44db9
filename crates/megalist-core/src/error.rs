//! Error types for Megalist.

use thiserror::Error;

/// Result type alias using Megalist's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Megalist.
#[derive(Error, Debug)]
pub enum Error {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    // Reconciliation errors
    #[error("Source playlist {playlist_id} is unavailable: {reason}")]
    SourceUnavailable { playlist_id: String, reason: String },

    #[error("Batch mutation on {playlist_id} failed at offset {offset}: {source}")]
    BatchMutation {
        playlist_id: String,
        /// Number of tracks durably applied before the failing batch.
        offset: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Playlist {0} is frozen")]
    Frozen(String),

    #[error("Playlist {0} cannot be reconciled")]
    NotReconcilable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Registry errors
    #[error("Registry error: {0}")]
    Registry(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// HTTP-specific errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed with status {status}: {message}")]
    StatusError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Returns true if this is a rate limit error.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true if the credential is missing or was rejected.
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// HTTP status code carried by this error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http(HttpError::StatusError { status, .. }) => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Offset to resume an interrupted population from.
    pub const fn resume_offset(&self) -> Option<usize> {
        match self {
            Self::BatchMutation { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
