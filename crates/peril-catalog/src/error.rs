//! Error types for peril-catalog operations.

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Resource not found.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// Payload validation failed for every record in a batch.
    #[error("validation failed: {detail}")]
    Validation {
        /// Per-record failure reasons.
        detail: String,
    },

    /// The request field combination is not one the engine accepts.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the rejected combination.
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },
}

impl CatalogError {
    /// Returns `true` if this error represents a missing object or path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<peril_core::Error> for CatalogError {
    fn from(err: peril_core::Error) -> Self {
        match err {
            peril_core::Error::NotFound(message) => Self::NotFound { message },
            peril_core::Error::InvalidInput(message) => Self::InvalidRequest { message },
            peril_core::Error::Serialization { message } => Self::Serialization { message },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_not_found_stays_not_found() {
        let err: CatalogError = peril_core::Error::NotFound("a/b.json".into()).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn core_storage_maps_to_storage() {
        let err: CatalogError = peril_core::Error::storage("boom").into();
        assert!(matches!(err, CatalogError::Storage { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn core_invalid_input_maps_to_invalid_request() {
        let err: CatalogError = peril_core::Error::InvalidInput("bad name".into()).into();
        assert!(matches!(err, CatalogError::InvalidRequest { .. }));
    }
}
