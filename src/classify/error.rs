//! Classifier error types.

use crate::metadata::DataAccessError;

/// Result type for classifier operations.
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Errors raised while preparing data for, training, or running a classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Model is not ready for live classification")]
    NotTrained,

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Unsupported classifier state version {found} (expected {expected})")]
    StateVersion { expected: u32, found: u32 },

    #[error("Invalid classifier state: {0}")]
    InvalidState(String),

    #[error("Invalid training spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::InvalidState(err.to_string())
    }
}
