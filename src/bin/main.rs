//! Scoreflow binary.
//!
//! One-shot batch scoring: load a checkpoint and a JSON array of input
//! values, score them partition-parallel with a registered predictor kind,
//! and write the predictions as JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use scoreflow_core::config::{Args, ServiceConfig};
use scoreflow_core::{BatchPredictor, Checkpoint, Dataset, LinearPredictor, PredictorDescriptor};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

fn load_checkpoint(path: &Path) -> Result<Checkpoint> {
    if path.is_dir() {
        return Checkpoint::from_directory(path)
            .with_context(|| format!("loading checkpoint directory {}", path.display()));
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading checkpoint payload {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("parsing checkpoint payload {}", path.display()))?;
    Ok(Checkpoint::from_value(value)?)
}

fn load_dataset(path: &Path, partitions: Option<usize>) -> Result<Dataset> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading input {}", path.display()))?;
    let items: Vec<f64> = serde_json::from_str(&text).with_context(|| {
        format!(
            "parsing input {}: expected a JSON array of numbers",
            path.display()
        )
    })?;
    let dataset = Dataset::from_items(items);
    match partitions {
        Some(n) => Ok(dataset.repartition(n)?),
        None => Ok(dataset),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load(&args)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .parse_lossy(&config.logging.filter),
        )
        .with_target(true)
        .init();

    let checkpoint_path = args
        .checkpoint
        .as_deref()
        .context("--checkpoint is required")?;
    let input_path = args.input.as_deref().context("--input is required")?;
    let kind = args
        .kind
        .clone()
        .unwrap_or_else(|| LinearPredictor::KIND.to_string());

    let checkpoint = load_checkpoint(checkpoint_path)?;
    let dataset = load_dataset(input_path, config.data.partitions)?;
    info!(
        rows = dataset.num_rows(),
        partitions = dataset.num_partitions(),
        kind = %kind,
        "scoring input"
    );

    let descriptor = PredictorDescriptor::new(kind);
    let predictor = BatchPredictor::from_descriptor(&descriptor, checkpoint)?;
    let output = predictor.predict(dataset, &config.predict_options()).await?;
    let values = output.to_f64_vec()?;

    let rendered = serde_json::to_string_pretty(&values)?;
    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("writing predictions to {}", path.display()))?;
            info!(path = %path.display(), rows = values.len(), "wrote predictions");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
