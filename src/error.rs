//! Error types for the scoreflow library.

use thiserror::Error;

/// A specialized Result type for scoreflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for scoreflow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A predictor instance reached a transfer boundary.
    ///
    /// Predictor instances hold process-local state and never cross the
    /// object-transfer boundary. Transfer the [`Checkpoint`] or a
    /// [`PredictorDescriptor`] and construct the predictor on the receiving
    /// side instead.
    ///
    /// [`Checkpoint`]: crate::checkpoint::Checkpoint
    /// [`PredictorDescriptor`]: crate::predictor::PredictorDescriptor
    #[error("Predictor not serializable: {0}")]
    PredictorNotSerializable(String),

    /// No predictor kind with this name is registered.
    #[error("Unknown predictor kind: {0:?}")]
    UnknownPredictor(String),

    /// Checkpoint construction, materialization, or restoration failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Malformed batch or dataset (column length mismatch, bad schema, ...).
    #[error("Data error: {0}")]
    Data(String),

    /// A scoring worker failed or the pool lost a worker.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Lookup of an object ref the store does not hold.
    #[error("Object not found: {0}")]
    ObjectNotFound(uuid::Uuid),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a checkpoint error.
    pub fn checkpoint<S: Into<String>>(msg: S) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a data error.
    pub fn data<S: Into<String>>(msg: S) -> Self {
        Self::Data(msg.into())
    }

    /// Create a worker error.
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Check whether this error is the transfer-boundary rejection for
    /// predictor instances.
    pub fn is_not_serializable(&self) -> bool {
        matches!(self, Self::PredictorNotSerializable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for Error {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Data(err.to_string())
    }
}
