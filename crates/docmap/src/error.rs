//! Error types for the document mapping layer.
//!
//! Every operation returns [`StorageError`] to its immediate caller. Bulk
//! writes only fail as a whole for input, open, or flush faults; per-item
//! problems surface as failed positions in the
//! [`BulkResult`](crate::core::bulk::BulkResult).

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The error type for all document operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Network or connection failure talking to the engine. Not retried.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The engine answered with an error status. The body is kept verbatim.
    #[error("response error (status {status}): {body}")]
    Response { status: u16, body: String },

    /// A payload did not match the shape of the target type.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// No identifier binding, or an empty identifier where one is required.
    #[error("missing document identifier: {message}")]
    MissingIdentifier { message: String },

    /// Create against a key that already exists.
    #[error("document already exists: {index}/{id}")]
    DuplicateKey { index: String, id: String },

    /// Update, patch or delete against an absent document.
    #[error("document not found: {index}/{id}")]
    NotFound { index: String, id: String },

    /// The operation was called with unusable input.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The client or batch channel configuration is unusable.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

/// Result type alias for document operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Creates a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        StorageError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        StorageError::Decode {
            message: message.into(),
        }
    }

    /// Creates a missing identifier error.
    pub fn missing_identifier(message: impl Into<String>) -> Self {
        StorageError::MissingIdentifier {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StorageError::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        StorageError::Configuration {
            message: message.into(),
        }
    }
}

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Decode {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "elasticsearch")]
impl From<elasticsearch::Error> for StorageError {
    fn from(err: elasticsearch::Error) -> Self {
        StorageError::Transport {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
