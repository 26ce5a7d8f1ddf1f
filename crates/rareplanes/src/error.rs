//! Error types for rareplanes.
//!
//! This module defines all error types used throughout the rareplanes crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rareplanes operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Remote Source Errors ===
    /// An HTTP request could not be completed.
    #[error("request to {url} failed: {source}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// A remote source answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The status code returned.
        status: u16,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response from {source_name}: {message}")]
    Decode {
        /// Which remote source produced the body.
        source_name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Usage Errors ===
    /// A bounding box argument could not be parsed or is out of range.
    #[error("invalid bounds '{input}': {message}")]
    InvalidBounds {
        /// The raw argument.
        input: String,
        /// Description of what is wrong with it.
        message: String,
    },

    /// More challenges were supplied than can be displayed.
    #[error("at most {max} challenges can be shown, got {count}")]
    TooManyChallenges {
        /// Number of challenges supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    // === Server Errors ===
    /// The live server could not bind its listening socket.
    #[error("failed to listen on {addr}: {source}")]
    ServerBind {
        /// Address that couldn't be bound.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write an output document.
    #[error("failed to write {path}: {source}")]
    OutputWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for rareplanes operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new HTTP transport error for the given URL.
    #[must_use]
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    /// Create a new decode error.
    #[must_use]
    pub fn decode(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            source_name,
            message: message.into(),
        }
    }

    /// Create a new bounds error.
    #[must_use]
    pub fn invalid_bounds(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBounds {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error came from talking to a remote source.
    ///
    /// These are the errors the pipeline reports and skips past.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::HttpStatus { .. } | Self::Decode { .. }
        )
    }

    /// Check if this error was caused by bad user input.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBounds { .. } | Self::TooManyChallenges { .. }
        )
    }
}
