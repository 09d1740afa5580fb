//! Engine error types.

use thiserror::Error;

use crate::coord::DepthError;
use crate::crosshole::{DocumentId, SettingsError};

/// Errors from engine-level operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No open document has this id.
    #[error("Unknown document {0}")]
    UnknownDocument(DocumentId),

    /// A document with this id is already open.
    #[error("Document {0} is already open")]
    DuplicateDocument(DocumentId),

    /// Malformed depth input.
    #[error(transparent)]
    Depth(#[from] DepthError),

    /// Sync settings could not be located.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Failed to create the Tokio runtime.
    #[error("Failed to create Tokio runtime: {0}")]
    RuntimeCreation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::UnknownDocument(DocumentId(7));
        assert_eq!(err.to_string(), "Unknown document doc#7");
    }

    #[test]
    fn test_engine_error_from_depth_error() {
        let err: EngineError = DepthError::InvalidDepth(f64::NAN).into();
        assert!(matches!(err, EngineError::Depth(_)));
        assert!(err.to_string().contains("Invalid depth"));
    }
}
