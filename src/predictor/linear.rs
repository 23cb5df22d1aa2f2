//! Built-in linear predictor.

use serde_json::Value;

use crate::checkpoint::Checkpoint;
use crate::data::DataBatch;
use crate::error::{Error, Result};
use crate::non_transferable;

use super::{Predictor, PredictorParams};

/// Scores every value as `factor * x + bias`.
///
/// State comes from the checkpoint payload: `"factor"` is required,
/// `"bias"` is optional and defaults to zero. Ships registered under the
/// `"linear"` kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPredictor {
    factor: f64,
    bias: f64,
}

non_transferable!(LinearPredictor);

impl LinearPredictor {
    /// Registry kind name.
    pub const KIND: &'static str = "linear";

    /// Construct directly, bypassing a checkpoint.
    pub fn new(factor: f64, bias: f64) -> Self {
        Self { factor, bias }
    }

    /// The multiplicative coefficient.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// The additive term.
    pub fn bias(&self) -> f64 {
        self.bias
    }
}

impl Predictor for LinearPredictor {
    fn from_checkpoint(checkpoint: Checkpoint, _params: &PredictorParams) -> Result<Self> {
        let payload = checkpoint.to_dict()?;
        let factor = payload
            .get("factor")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                Error::checkpoint("checkpoint payload is missing a numeric \"factor\"")
            })?;
        let bias = match payload.get("bias") {
            None => 0.0,
            Some(value) => value
                .as_f64()
                .ok_or_else(|| Error::checkpoint("\"bias\" must be numeric"))?,
        };
        Ok(Self { factor, bias })
    }

    fn predict(&self, batch: &DataBatch, _params: &PredictorParams) -> Result<DataBatch> {
        Ok(batch.map_values(|x| self.factor * x + self.bias))
    }
}
