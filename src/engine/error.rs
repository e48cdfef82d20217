//! Engine error types.

use crate::classify::ClassifierError;
use crate::config::{ConnectionError, SettingsError};
use crate::graph::GraphError;
use crate::metadata::DataAccessError;
use crate::store::StoreError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to callers of the engine registry.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Configuration(#[from] SettingsError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// No built engine is available for the database yet.
    #[error("Engine for '{0}' is not ready")]
    NotReady(String),

    /// A previous build of the database failed.
    #[error("Build of '{database}' failed: {message}")]
    BuildFailed { database: String, message: String },
}
