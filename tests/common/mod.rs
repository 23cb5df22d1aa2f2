//! Shared test predictors and checkpoint fixtures.
#![allow(dead_code)]

use std::time::Duration;

use scoreflow_core::checkpoint::Checkpoint;
use scoreflow_core::data::DataBatch;
use scoreflow_core::non_transferable;
use scoreflow_core::predictor::{Predictor, PredictorParams};
use scoreflow_core::{Error, Result};
use serde_json::{json, Value};

/// Simulated state-loading delay of [`ScalingFsPredictor`]. Paid once per
/// constructed predictor.
pub const FS_CONSTRUCTION_DELAY: Duration = Duration::from_millis(200);

/// Checkpoint holding just a scaling factor.
pub fn factor_checkpoint(factor: f64) -> Checkpoint {
    Checkpoint::from_value(json!({ "factor": factor })).expect("object payload")
}

/// Multiplies every value by the checkpoint's `factor`.
pub struct ScalingPredictor {
    factor: f64,
}

non_transferable!(ScalingPredictor);

impl Predictor for ScalingPredictor {
    fn from_checkpoint(checkpoint: Checkpoint, _params: &PredictorParams) -> Result<Self> {
        let factor = checkpoint
            .to_dict()?
            .get("factor")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::checkpoint("missing factor"))?;
        Ok(Self { factor })
    }

    fn predict(&self, batch: &DataBatch, _params: &PredictorParams) -> Result<DataBatch> {
        Ok(batch.map_values(|x| x * self.factor))
    }
}

/// Like [`ScalingPredictor`], but loads its state through a materialized
/// checkpoint directory with a simulated read delay, the way a predictor
/// restoring model files from disk would.
pub struct ScalingFsPredictor {
    inner: ScalingPredictor,
}

non_transferable!(ScalingFsPredictor);

impl Predictor for ScalingFsPredictor {
    fn from_checkpoint(checkpoint: Checkpoint, params: &PredictorParams) -> Result<Self> {
        let dir = checkpoint.as_directory()?;
        std::thread::sleep(FS_CONSTRUCTION_DELAY);
        let reloaded = Checkpoint::from_directory(dir.path())?;
        Ok(Self {
            inner: ScalingPredictor::from_checkpoint(reloaded, params)?,
        })
    }

    fn predict(&self, batch: &DataBatch, params: &PredictorParams) -> Result<DataBatch> {
        self.inner.predict(batch, params)
    }
}
