//! Partition-parallel batch prediction.
//!
//! A [`BatchPredictor`] pairs a shared [`Checkpoint`] with a predictor
//! factory and scores a [`Dataset`] across a pool of blocking workers.
//! Each worker constructs its own predictor from the checkpoint exactly
//! once, then pulls partitions from a shared queue until it drains. Outputs
//! are reassembled by partition index, so results are in input order no
//! matter which worker scored what.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_stream::try_stream;
use futures::future::join_all;
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::checkpoint::Checkpoint;
use crate::data::{DataBatch, Dataset};
use crate::error::{Error, Result};
use crate::predictor::registry::{build_predictor, factory_for, PredictorFactory};
use crate::predictor::{Predictor, PredictorDescriptor, PredictorParams};

/// Scheduling knobs for a prediction run.
///
/// None of these change results: worker bounds steer parallelism and
/// `batch_size` re-chunks partitions before they reach the predictor, but
/// output values and order stay identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictOptions {
    /// Lower bound on scoring workers. A hint: the pool never exceeds the
    /// partition count.
    pub min_workers: usize,
    /// Upper bound on scoring workers. Defaults to unbounded.
    pub max_workers: Option<usize>,
    /// Maximum rows handed to one `predict` call. Defaults to whole
    /// partitions.
    pub batch_size: Option<usize>,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: None,
            batch_size: None,
        }
    }
}

impl PredictOptions {
    /// Set the minimum worker count.
    pub fn with_min_workers(mut self, min_workers: usize) -> Self {
        self.min_workers = min_workers;
        self
    }

    /// Set the maximum worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Set the per-call row limit.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Worker count actually used for `partitions` input partitions:
    /// the available parallelism clamped to the configured bounds, capped
    /// by the partition count.
    pub fn effective_workers(&self, partitions: usize) -> usize {
        let floor = self.min_workers.max(1);
        let ceiling = self.max_workers.unwrap_or(usize::MAX).max(floor);
        num_cpus::get().clamp(floor, ceiling).min(partitions).max(1)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == Some(0) {
            return Err(Error::data("batch_size must be at least 1"));
        }
        Ok(())
    }
}

/// Scores datasets partition-parallel from a shared checkpoint.
///
/// The predictor type is erased behind a factory, so one `BatchPredictor`
/// value can be driven by a concrete type ([`BatchPredictor::from_checkpoint`])
/// or by a registry kind ([`BatchPredictor::from_descriptor`]). The
/// checkpoint is cloned to every worker; predictor instances never leave
/// the worker that built them.
pub struct BatchPredictor {
    checkpoint: Checkpoint,
    params: PredictorParams,
    factory: PredictorFactory,
}

enum WorkerMessage {
    Scored(usize, DataBatch),
    Failed(Error),
}

impl BatchPredictor {
    /// Build from a checkpoint for a concrete predictor type.
    pub fn from_checkpoint<P: Predictor + 'static>(checkpoint: Checkpoint) -> Self {
        Self::from_checkpoint_with_params::<P>(checkpoint, PredictorParams::new())
    }

    /// Build from a checkpoint with construction params.
    pub fn from_checkpoint_with_params<P: Predictor + 'static>(
        checkpoint: Checkpoint,
        params: PredictorParams,
    ) -> Self {
        Self {
            checkpoint,
            params,
            factory: factory_for::<P>(),
        }
    }

    /// Build from a transferable descriptor plus a checkpoint.
    ///
    /// The kind must be registered; workers resolve it again when they
    /// construct their predictors.
    pub fn from_descriptor(
        descriptor: &PredictorDescriptor,
        checkpoint: Checkpoint,
    ) -> Result<Self> {
        if !crate::predictor::registered_kinds().contains(&descriptor.kind) {
            return Err(Error::UnknownPredictor(descriptor.kind.clone()));
        }
        let kind = descriptor.kind.clone();
        let factory: PredictorFactory =
            Arc::new(move |checkpoint, params| build_predictor(&kind, checkpoint, params));
        Ok(Self {
            checkpoint,
            params: descriptor.params.clone(),
            factory,
        })
    }

    /// The shared checkpoint workers construct from.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Params forwarded to every construction and scoring call.
    pub fn params(&self) -> &PredictorParams {
        &self.params
    }

    /// Score the dataset and return the outputs with the same partitioning
    /// and order as the input.
    ///
    /// An empty dataset comes back unchanged without constructing any
    /// predictor. A failing partition fails the whole run: the first error
    /// is returned unmodified and no partial results are kept.
    #[instrument(
        skip_all,
        fields(partitions = dataset.num_partitions(), rows = dataset.num_rows())
    )]
    pub async fn predict(&self, dataset: Dataset, options: &PredictOptions) -> Result<Dataset> {
        options.validate()?;
        if dataset.num_rows() == 0 {
            debug!("empty dataset, skipping predictor construction");
            return Ok(dataset);
        }

        let partitions = dataset.into_partitions();
        let total = partitions.len();
        let workers = options.effective_workers(total);
        info!(workers, partitions = total, "starting batch prediction");

        let queue: Arc<Mutex<VecDeque<(usize, DataBatch)>>> =
            Arc::new(Mutex::new(partitions.into_iter().enumerate().collect()));
        let failed = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let failed = Arc::clone(&failed);
            let factory = Arc::clone(&self.factory);
            let checkpoint = self.checkpoint.clone();
            let params = self.params.clone();
            let batch_size = options.batch_size;
            handles.push(tokio::task::spawn_blocking(move || {
                score_partitions(worker_id, factory, checkpoint, params, queue, batch_size, failed)
            }));
        }

        let mut scored: Vec<Option<DataBatch>> = (0..total).map(|_| None).collect();
        let mut first_error = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(outputs)) => {
                    for (index, output) in outputs {
                        scored[index] = Some(output);
                    }
                }
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(Error::worker(format!(
                            "scoring worker panicked or was cancelled: {e}"
                        )));
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let mut outputs = Vec::with_capacity(total);
        for (index, slot) in scored.into_iter().enumerate() {
            outputs.push(
                slot.ok_or_else(|| Error::worker(format!("partition {index} was never scored")))?,
            );
        }
        Ok(Dataset::from_batches(outputs))
    }

    /// Pipelined scoring: partitions are yielded in input order as soon as
    /// they and all their predecessors are done.
    ///
    /// Values match [`BatchPredictor::predict`] exactly. On failure the
    /// stream yields the error unmodified as its final item.
    pub fn predict_stream(
        &self,
        dataset: Dataset,
        options: &PredictOptions,
    ) -> impl Stream<Item = Result<DataBatch>> + Send + 'static {
        let factory = Arc::clone(&self.factory);
        let checkpoint = self.checkpoint.clone();
        let params = self.params.clone();
        let options = options.clone();
        try_stream! {
            options.validate()?;
            if dataset.num_rows() == 0 {
                for batch in dataset.into_partitions() {
                    yield batch;
                }
                return;
            }

            let partitions = dataset.into_partitions();
            let total = partitions.len();
            let workers = options.effective_workers(total);
            info!(workers, partitions = total, "starting pipelined prediction");

            let queue: Arc<Mutex<VecDeque<(usize, DataBatch)>>> =
                Arc::new(Mutex::new(partitions.into_iter().enumerate().collect()));
            let failed = Arc::new(AtomicBool::new(false));
            let (sender, mut receiver) = mpsc::unbounded_channel();

            let mut handles = Vec::with_capacity(workers);
            for worker_id in 0..workers {
                let queue = Arc::clone(&queue);
                let failed = Arc::clone(&failed);
                let factory = Arc::clone(&factory);
                let checkpoint = checkpoint.clone();
                let params = params.clone();
                let batch_size = options.batch_size;
                let sender = sender.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    stream_partitions(
                        worker_id, factory, checkpoint, params, queue, batch_size, failed, sender,
                    )
                }));
            }
            // Workers hold the only senders; the channel closes when the
            // last one finishes.
            drop(sender);

            let mut next_index = 0;
            let mut pending: BTreeMap<usize, DataBatch> = BTreeMap::new();
            while let Some(message) = receiver.recv().await {
                match message {
                    WorkerMessage::Scored(index, output) => {
                        pending.insert(index, output);
                        while let Some(output) = pending.remove(&next_index) {
                            yield output;
                            next_index += 1;
                        }
                    }
                    WorkerMessage::Failed(e) => {
                        Err(e)?;
                    }
                }
            }

            for handle in handles {
                handle.await.map_err(|e| {
                    Error::worker(format!("scoring worker panicked or was cancelled: {e}"))
                })?;
            }
            if next_index != total {
                Err(Error::worker(format!(
                    "partition {next_index} was never scored"
                )))?;
            }
        }
    }
}

/// Worker body for [`BatchPredictor::predict`]: build one predictor, then
/// drain the queue, collecting index-tagged outputs.
fn score_partitions(
    worker_id: usize,
    factory: PredictorFactory,
    checkpoint: Checkpoint,
    params: PredictorParams,
    queue: Arc<Mutex<VecDeque<(usize, DataBatch)>>>,
    batch_size: Option<usize>,
    failed: Arc<AtomicBool>,
) -> Result<Vec<(usize, DataBatch)>> {
    let predictor = match factory(checkpoint, &params) {
        Ok(predictor) => predictor,
        Err(e) => {
            failed.store(true, Ordering::SeqCst);
            return Err(e);
        }
    };
    debug!(worker_id, "constructed predictor");

    let mut outputs = Vec::new();
    loop {
        if failed.load(Ordering::SeqCst) {
            return Ok(outputs);
        }
        let next = queue.lock().pop_front();
        let Some((index, batch)) = next else { break };
        match score_batch(predictor.as_ref(), &batch, &params, batch_size) {
            Ok(output) => outputs.push((index, output)),
            Err(e) => {
                failed.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
    }
    debug!(worker_id, scored = outputs.len(), "worker drained queue");
    Ok(outputs)
}

/// Worker body for [`BatchPredictor::predict_stream`]: like
/// [`score_partitions`] but delivers each result as soon as it is scored.
#[allow(clippy::too_many_arguments)]
fn stream_partitions(
    worker_id: usize,
    factory: PredictorFactory,
    checkpoint: Checkpoint,
    params: PredictorParams,
    queue: Arc<Mutex<VecDeque<(usize, DataBatch)>>>,
    batch_size: Option<usize>,
    failed: Arc<AtomicBool>,
    sender: mpsc::UnboundedSender<WorkerMessage>,
) {
    let predictor = match factory(checkpoint, &params) {
        Ok(predictor) => predictor,
        Err(e) => {
            failed.store(true, Ordering::SeqCst);
            let _ = sender.send(WorkerMessage::Failed(e));
            return;
        }
    };
    debug!(worker_id, "constructed predictor");

    loop {
        if failed.load(Ordering::SeqCst) {
            return;
        }
        let next = queue.lock().pop_front();
        let Some((index, batch)) = next else { return };
        match score_batch(predictor.as_ref(), &batch, &params, batch_size) {
            Ok(output) => {
                if sender.send(WorkerMessage::Scored(index, output)).is_err() {
                    // Consumer dropped the stream; stop scoring.
                    return;
                }
            }
            Err(e) => {
                failed.store(true, Ordering::SeqCst);
                let _ = sender.send(WorkerMessage::Failed(e));
                return;
            }
        }
    }
}

/// Score one partition, re-chunked to at most `batch_size` rows per call.
fn score_batch(
    predictor: &dyn Predictor,
    batch: &DataBatch,
    params: &PredictorParams,
    batch_size: Option<usize>,
) -> Result<DataBatch> {
    match batch_size {
        None => predictor.predict(batch, params),
        Some(size) if batch.len() <= size => predictor.predict(batch, params),
        Some(size) => {
            let mut chunks = Vec::with_capacity(batch.len().div_ceil(size));
            let mut offset = 0;
            while offset < batch.len() {
                let len = size.min(batch.len() - offset);
                chunks.push(predictor.predict(&batch.slice(offset, len), params)?);
                offset += len;
            }
            DataBatch::concat(&chunks)
        }
    }
}
