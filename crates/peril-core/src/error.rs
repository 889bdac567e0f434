//! Error types and result aliases for Peril.
//!
//! This module defines the shared error types used across all Peril components.
//! Errors are structured for programmatic handling and include context for debugging.

use thiserror::Error;

/// The result type used throughout Peril.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Peril operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this error represents a missing object or path.
    ///
    /// Callers that treat "not there yet" as a signal to create rather than
    /// fail should branch on this instead of matching message text.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_without_source() {
        let err = Error::storage("write failed");
        assert_eq!(err.to_string(), "storage error: write failed");
    }

    #[test]
    fn storage_error_with_source_preserves_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = Error::storage_with_source("write failed", cause);
        assert_eq!(err.to_string(), "storage error: write failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn not_found_detection() {
        assert!(Error::NotFound("a/b.json".into()).is_not_found());
        assert!(!Error::storage("boom").is_not_found());
        assert!(!Error::InvalidInput("bad".into()).is_not_found());
    }
}
