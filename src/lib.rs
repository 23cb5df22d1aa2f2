//! Checkpoint-driven batch prediction.
//!
//! Predictors are constructed from transferable [`Checkpoint`]s and applied
//! partition-parallel over [`Dataset`]s by a [`BatchPredictor`]. Predictor
//! instances themselves stay process-local; checkpoints and
//! [`PredictorDescriptor`]s are what cross the [`ObjectStore`] boundary.

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod predictor;
pub mod store;

// Re-export commonly used types
pub use batch::{BatchPredictor, PredictOptions};
pub use checkpoint::{Checkpoint, CheckpointData, CheckpointDirectory};
pub use data::{DataBatch, Dataset};
pub use error::{Error, Result};
pub use predictor::{
    register_predictor, LinearPredictor, Predictor, PredictorDescriptor, PredictorParams,
};
pub use store::{InMemoryStore, ObjectRef, ObjectStore};

// Support for macro expansions; not part of the public API.
#[doc(hidden)]
pub mod __private {
    pub use serde;
}
