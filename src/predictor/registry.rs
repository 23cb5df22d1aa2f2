//! Predictor kind registry and transferable descriptors.
//!
//! Predictor instances stay process-local, so remote callers name predictors
//! instead: a [`PredictorDescriptor`] carries a registered kind plus
//! construction params, and the receiving side resolves it against the
//! global registry to build the predictor next to the data.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkpoint::Checkpoint;
use crate::error::{Error, Result};

use super::{LinearPredictor, Predictor, PredictorParams};

/// Erased predictor constructor: builds a boxed predictor from a checkpoint
/// and params. Cloning shares the same factory.
pub type PredictorFactory =
    Arc<dyn Fn(Checkpoint, &PredictorParams) -> Result<Box<dyn Predictor>> + Send + Sync>;

pub(crate) fn factory_for<P: Predictor + 'static>() -> PredictorFactory {
    Arc::new(|checkpoint, params| {
        Ok(Box::new(P::from_checkpoint(checkpoint, params)?) as Box<dyn Predictor>)
    })
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, PredictorFactory>> = {
        let mut kinds: HashMap<String, PredictorFactory> = HashMap::new();
        kinds.insert(
            LinearPredictor::KIND.to_string(),
            factory_for::<LinearPredictor>(),
        );
        RwLock::new(kinds)
    };
}

/// Register a predictor type under `kind`, replacing any previous
/// registration for that name.
pub fn register_predictor<P: Predictor + 'static>(kind: impl Into<String>) {
    let kind = kind.into();
    let replaced = REGISTRY
        .write()
        .insert(kind.clone(), factory_for::<P>())
        .is_some();
    if replaced {
        debug!(kind = %kind, "replaced predictor registration");
    } else {
        debug!(kind = %kind, "registered predictor");
    }
}

/// Names of all registered predictor kinds, sorted.
pub fn registered_kinds() -> Vec<String> {
    let mut kinds: Vec<String> = REGISTRY.read().keys().cloned().collect();
    kinds.sort();
    kinds
}

/// Build a predictor of a registered kind from a checkpoint.
pub fn build_predictor(
    kind: &str,
    checkpoint: Checkpoint,
    params: &PredictorParams,
) -> Result<Box<dyn Predictor>> {
    let factory = REGISTRY
        .read()
        .get(kind)
        .cloned()
        .ok_or_else(|| Error::UnknownPredictor(kind.to_string()))?;
    factory(checkpoint, params)
}

/// Transferable recipe for constructing a predictor remotely.
///
/// Unlike a predictor instance, a descriptor serializes freely: it holds
/// only the registered kind name and construction params. Pair it with a
/// [`Checkpoint`] on the receiving side to obtain a working predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorDescriptor {
    /// Registered predictor kind.
    pub kind: String,
    /// Params forwarded to `Predictor::from_checkpoint`.
    #[serde(default)]
    pub params: PredictorParams,
}

impl PredictorDescriptor {
    /// Describe a predictor by registered kind, with empty params.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: PredictorParams::new(),
        }
    }

    /// Attach construction params.
    pub fn with_params(mut self, params: PredictorParams) -> Self {
        self.params = params;
        self
    }

    /// Resolve against the registry and construct the predictor.
    pub fn build(&self, checkpoint: Checkpoint) -> Result<Box<dyn Predictor>> {
        build_predictor(&self.kind, checkpoint, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataBatch;
    use serde_json::json;

    struct OffsetPredictor {
        offset: f64,
    }

    impl Predictor for OffsetPredictor {
        fn from_checkpoint(checkpoint: Checkpoint, _params: &PredictorParams) -> Result<Self> {
            let offset = checkpoint
                .to_dict()?
                .get("offset")
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| Error::checkpoint("missing offset"))?;
            Ok(Self { offset })
        }

        fn predict(&self, batch: &DataBatch, _params: &PredictorParams) -> Result<DataBatch> {
            Ok(batch.map_values(|x| x + self.offset))
        }
    }

    #[test]
    fn test_builtin_linear_kind_is_registered() {
        assert!(registered_kinds().contains(&LinearPredictor::KIND.to_string()));
    }

    #[test]
    fn test_build_unknown_kind_fails() {
        let checkpoint = Checkpoint::from_value(json!({})).unwrap();
        assert!(matches!(
            build_predictor("no-such-kind", checkpoint, &PredictorParams::new()),
            Err(Error::UnknownPredictor(kind)) if kind == "no-such-kind"
        ));
    }

    #[test]
    fn test_register_and_build_custom_kind() {
        register_predictor::<OffsetPredictor>("offset-test");
        let checkpoint = Checkpoint::from_value(json!({ "offset": 10.0 })).unwrap();
        let predictor =
            build_predictor("offset-test", checkpoint, &PredictorParams::new()).unwrap();
        let output = predictor
            .predict(&DataBatch::scalars([1.0, 2.0]), &PredictorParams::new())
            .unwrap();
        assert_eq!(output, DataBatch::scalars([11.0, 12.0]));
    }

    #[test]
    fn test_descriptor_round_trip_and_build() {
        let descriptor = PredictorDescriptor::new(LinearPredictor::KIND);
        let encoded = serde_json::to_string(&descriptor).unwrap();
        let decoded: PredictorDescriptor = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, descriptor);

        let checkpoint = Checkpoint::from_value(json!({ "factor": 3.0 })).unwrap();
        let predictor = decoded.build(checkpoint).unwrap();
        let output = predictor
            .predict(&DataBatch::scalars([2.0]), &PredictorParams::new())
            .unwrap();
        assert_eq!(output, DataBatch::scalars([6.0]));
    }
}
