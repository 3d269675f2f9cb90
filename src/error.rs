//! Error types for chatdesk.
//!
//! `Display` on every variant is the human-readable text the request
//! pipeline settles on; API wrappers copy it into
//! [`ApiResult::Failure::error`](crate::api::ApiResult) and pair it with
//! their own user-facing label.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for chatdesk.
#[derive(Debug, Error)]
pub enum Error {
    // ── Validation ───────────────────────────────────────────────────────────
    /// Input rejected before any network call (file type, file size, ...).
    #[error("{0}")]
    Validation(String),

    // ── Transport ────────────────────────────────────────────────────────────
    /// No response within the configured timeout.
    #[error("Request timed out, please try again later")]
    Timeout,

    /// The server could not be reached at all.
    #[error("Network connection failed, please check your network")]
    Connectivity(#[source] reqwest::Error),

    /// Any other failure before a response was received.
    #[error("Network error, please try again later")]
    Network(#[source] reqwest::Error),

    // ── HTTP / business ──────────────────────────────────────────────────────
    /// A response arrived with an error status.
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Classified message.
        message: String,
    },

    /// A 2xx response whose envelope carried a non-success code.
    #[error("{message}")]
    Business {
        /// Application code from the envelope.
        code: i64,
        /// Server message, or the fallback for the code.
        message: String,
    },

    /// No session token is available for a call that needs one.
    #[error("Not logged in")]
    NotAuthenticated,

    // ── Decoding ─────────────────────────────────────────────────────────────
    /// Response body or stream frame could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Reading a streamed body failed midway.
    #[error("Stream error: {0}")]
    Stream(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Storage ──────────────────────────────────────────────────────────────
    /// Storage I/O error.
    #[error("Storage I/O error at {path}: {message}")]
    StorageIo {
        /// Path that caused the error.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// Stored session record could not be (de)serialized.
    #[error("Storage serialization error: {0}")]
    StorageSerialization(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    /// General I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any request was sent.
    Validation,
    /// Timeout, connectivity loss or another pre-response failure.
    Transport,
    /// Error status on the HTTP response.
    Http,
    /// Non-success application code inside a 2xx envelope.
    Business,
    /// Malformed body, frame or stored record.
    Decode,
    /// Local persistence failure.
    Storage,
    /// Bad configuration.
    Config,
}

impl Error {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Timeout | Error::Connectivity(_) | Error::Network(_) | Error::Stream(_) => {
                ErrorKind::Transport
            }
            Error::Http { .. } => ErrorKind::Http,
            Error::Business { .. } | Error::NotAuthenticated => ErrorKind::Business,
            Error::Decode(_) | Error::Json(_) => ErrorKind::Decode,
            Error::StorageIo { .. } | Error::StorageSerialization(_) | Error::Io(_) => {
                ErrorKind::Storage
            }
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns true if this error means the user has to log in again.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::NotAuthenticated
                | Error::Http { status: 401, .. }
                | Error::Business { code: 401, .. }
        )
    }

    /// Short text suitable for showing to an end user.
    ///
    /// Pipeline-classified variants already carry user-facing text; the
    /// remaining ones collapse to a generic sentence per bucket.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(_)
            | Error::Timeout
            | Error::Connectivity(_)
            | Error::Network(_)
            | Error::Http { .. }
            | Error::Business { .. }
            | Error::NotAuthenticated => self.to_string(),
            Error::Stream(_) => "The reply stream was interrupted".to_string(),
            Error::Decode(_) | Error::Json(_) => "Unexpected response from server".to_string(),
            Error::StorageIo { .. } | Error::StorageSerialization(_) | Error::Io(_) => {
                "Local storage error".to_string()
            }
            Error::Config(_) => "Invalid client configuration".to_string(),
        }
    }

    /// Returns true for failures where no response was received.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Creates a storage I/O error.
    #[must_use]
    pub fn storage_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::Connectivity(err)
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Network(err)
        }
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, Error>;
