//! Predictor trait and implementations.
//!
//! A [`Predictor`] is constructed from a [`Checkpoint`] and scores
//! [`DataBatch`]es. Construction and scoring are separate on purpose:
//! checkpoints and [`PredictorDescriptor`]s travel between processes,
//! predictor instances never do. The [`non_transferable!`] macro gives a
//! predictor type a `Serialize` impl that always fails with a recognizable
//! message, which the object store surfaces as
//! [`Error::PredictorNotSerializable`](crate::Error::PredictorNotSerializable).
//!
//! [`non_transferable!`]: crate::non_transferable

pub mod linear;
pub mod registry;

pub use linear::LinearPredictor;
pub use registry::{build_predictor, register_predictor, registered_kinds, PredictorDescriptor};

use serde_json::{Map, Value};

use crate::checkpoint::Checkpoint;
use crate::data::DataBatch;
use crate::error::Result;

/// Free-form keyword parameters passed to predictor construction and
/// scoring. Keys a predictor does not understand are ignored.
pub type PredictorParams = Map<String, Value>;

/// Marker message embedded in serialization errors produced by
/// [`non_transferable!`](crate::non_transferable). The object store matches
/// on it to reject predictor instances at the transfer boundary.
pub const NOT_TRANSFERABLE_MSG: &str = "predictor instances are not serializable; \
     transfer the checkpoint or a predictor descriptor and construct the predictor locally";

/// A model restored from a checkpoint that scores batches.
///
/// `from_checkpoint` is the only constructor the scoring machinery uses, so
/// any state a predictor needs must come from the checkpoint payload or the
/// construction params. Implementations are expected to be deterministic:
/// the same checkpoint and input batch always produce the same output.
pub trait Predictor: Send {
    /// Construct the predictor from checkpoint state.
    fn from_checkpoint(checkpoint: Checkpoint, params: &PredictorParams) -> Result<Self>
    where
        Self: Sized;

    /// Score one batch, producing an output batch with one prediction per
    /// input row.
    fn predict(&self, batch: &DataBatch, params: &PredictorParams) -> Result<DataBatch>;
}

/// Mark a predictor type as non-transferable.
///
/// Emits a poisoned `Serialize` impl that fails with
/// [`NOT_TRANSFERABLE_MSG`], so any attempt to move an instance through the
/// object store (or any other serde boundary) errors instead of silently
/// shipping process-local state. Apply it to every `Predictor` impl:
///
/// ```
/// use scoreflow_core::checkpoint::Checkpoint;
/// use scoreflow_core::data::DataBatch;
/// use scoreflow_core::predictor::{Predictor, PredictorParams};
/// use scoreflow_core::{non_transferable, Result};
///
/// struct Negate;
/// non_transferable!(Negate);
///
/// impl Predictor for Negate {
///     fn from_checkpoint(_: Checkpoint, _: &PredictorParams) -> Result<Self> {
///         Ok(Negate)
///     }
///     fn predict(&self, batch: &DataBatch, _: &PredictorParams) -> Result<DataBatch> {
///         Ok(batch.map_values(|x| -x))
///     }
/// }
/// ```
#[macro_export]
macro_rules! non_transferable {
    ($ty:ty) => {
        impl $crate::__private::serde::Serialize for $ty {
            fn serialize<S>(&self, _serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                Err(<S::Error as $crate::__private::serde::ser::Error>::custom(
                    ::std::format!(
                        "{}: {}",
                        ::std::any::type_name::<$ty>(),
                        $crate::predictor::NOT_TRANSFERABLE_MSG,
                    ),
                ))
            }
        }
    };
}
