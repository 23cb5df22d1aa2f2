//! Configuration management for the scoreflow service.
//!
//! This module provides configuration handling through multiple sources:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/scoreflow/config.toml`)
//! 3. User-specified configuration file
//! 4. Environment variables (prefixed with `SCOREFLOW_`)
//! 5. Command-line arguments
//!
//! Configuration options are loaded in order of precedence, with later
//! sources overriding earlier ones.

use crate::batch::PredictOptions;
use crate::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// Configuration file path
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Checkpoint to score with: a JSON payload file or a checkpoint directory
    #[clap(long)]
    pub checkpoint: Option<PathBuf>,

    /// Input values to score: a file holding a JSON array of numbers
    #[clap(long)]
    pub input: Option<PathBuf>,

    /// Registered predictor kind
    #[clap(long)]
    pub kind: Option<String>,

    /// Output file for predictions (stdout when omitted)
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Minimum number of scoring workers
    #[clap(long)]
    pub min_workers: Option<usize>,

    /// Maximum number of scoring workers
    #[clap(long)]
    pub max_workers: Option<usize>,

    /// Maximum rows handed to one predict call
    #[clap(long)]
    pub batch_size: Option<usize>,

    /// Repartition the input into this many partitions before scoring
    #[clap(long)]
    pub partitions: Option<usize>,

    /// Tracing filter directive (e.g. "info" or "scoreflow_core=debug")
    #[clap(long)]
    pub log_filter: Option<String>,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Scoring pool configuration
    pub scoring: ScoringConfig,
    /// Input data configuration
    #[serde(default)]
    pub data: DataConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scoring pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum number of scoring workers
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,
    /// Maximum number of scoring workers (no bound when unset)
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Maximum rows handed to one predict call (whole partitions when unset)
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Input data configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Repartition the input into this many partitions before scoring
    #[serde(default)]
    pub partitions: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from all sources
    pub fn load(args: &Args) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name("/etc/scoreflow/config.toml").required(false));

        // Load user config if specified
        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        // Add environment variables
        builder = builder.add_source(config::Environment::with_prefix("SCOREFLOW"));

        // Build config
        let mut config: ServiceConfig = builder.build()?.try_deserialize()?;

        // Override with command line args
        if let Some(min_workers) = args.min_workers {
            config.scoring.min_workers = min_workers;
        }
        if let Some(max_workers) = args.max_workers {
            config.scoring.max_workers = Some(max_workers);
        }
        if let Some(batch_size) = args.batch_size {
            config.scoring.batch_size = Some(batch_size);
        }
        if let Some(partitions) = args.partitions {
            config.data.partitions = Some(partitions);
        }
        if let Some(filter) = &args.log_filter {
            config.logging.filter = filter.clone();
        }

        Ok(config)
    }

    /// Convert scoring settings to predict options
    pub fn predict_options(&self) -> PredictOptions {
        PredictOptions {
            min_workers: self.scoring.min_workers,
            max_workers: self.scoring.max_workers,
            batch_size: self.scoring.batch_size,
        }
    }
}

fn default_min_workers() -> usize {
    1
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> Args {
        Args {
            config: None,
            checkpoint: None,
            input: None,
            kind: None,
            output: None,
            min_workers: None,
            max_workers: None,
            batch_size: None,
            partitions: None,
            log_filter: None,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = ServiceConfig::load(&bare_args()).unwrap();
        assert_eq!(config.scoring.min_workers, 1);
        assert_eq!(config.scoring.max_workers, None);
        assert_eq!(config.scoring.batch_size, None);
        assert_eq!(config.data.partitions, None);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args {
            min_workers: Some(4),
            max_workers: Some(8),
            batch_size: Some(256),
            partitions: Some(16),
            log_filter: Some("debug".to_string()),
            ..bare_args()
        };

        let config = ServiceConfig::load(&args).unwrap();
        assert_eq!(config.scoring.min_workers, 4);
        assert_eq!(config.scoring.max_workers, Some(8));
        assert_eq!(config.scoring.batch_size, Some(256));
        assert_eq!(config.data.partitions, Some(16));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_predict_options_conversion() {
        let config = ServiceConfig {
            scoring: ScoringConfig {
                min_workers: 4,
                max_workers: Some(8),
                batch_size: Some(128),
            },
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
        };

        let options = config.predict_options();
        assert_eq!(options.min_workers, 4);
        assert_eq!(options.max_workers, Some(8));
        assert_eq!(options.batch_size, Some(128));
    }
}
