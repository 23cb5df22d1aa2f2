//! Model-state checkpoints.
//!
//! A [`Checkpoint`] bundles predictor state in one of two interchangeable
//! forms: an in-memory payload map, or a directory on disk holding the
//! canonical `checkpoint.json` / `metadata.json` pair. In-memory checkpoints
//! can be materialized for filesystem consumers through a scoped
//! [`CheckpointDirectory`] guard; directory checkpoints can be loaded back
//! into memory with [`Checkpoint::to_dict`]. Checkpoints are the unit that
//! crosses process boundaries; deserializing always yields the in-memory
//! form.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// File holding the payload map inside a materialized checkpoint.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// File holding checkpoint identity inside a materialized checkpoint.
pub const METADATA_FILE: &str = "metadata.json";

/// In-memory checkpoint payload: a mapping of primitive values.
pub type CheckpointData = Map<String, Value>;

/// Checkpoint identity, stable across materialization round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Unique checkpoint identifier.
    pub checkpoint_id: Uuid,
    /// Timestamp when the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

impl CheckpointMetadata {
    fn new() -> Self {
        Self {
            checkpoint_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CheckpointRepr {
    Data(CheckpointData),
    Directory(PathBuf),
}

/// A bundle of predictor state plus identity metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    metadata: CheckpointMetadata,
    repr: CheckpointRepr,
}

/// Transfer form of a checkpoint: metadata plus fully loaded payload.
#[derive(Serialize, Deserialize)]
struct CheckpointWire {
    metadata: CheckpointMetadata,
    payload: CheckpointData,
}

impl Checkpoint {
    /// Create an in-memory checkpoint from a payload map.
    pub fn from_dict(payload: CheckpointData) -> Self {
        Checkpoint {
            metadata: CheckpointMetadata::new(),
            repr: CheckpointRepr::Data(payload),
        }
    }

    /// Create an in-memory checkpoint from a JSON object value.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(payload) => Ok(Self::from_dict(payload)),
            other => Err(Error::checkpoint(format!(
                "checkpoint payload must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Wrap an existing checkpoint directory.
    ///
    /// The directory must contain [`CHECKPOINT_FILE`]. Identity is restored
    /// from [`METADATA_FILE`] when present, otherwise fresh metadata is
    /// assigned. The directory is borrowed, not copied, and stays owned by
    /// the caller.
    pub fn from_directory<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(Error::checkpoint(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        if !path.join(CHECKPOINT_FILE).is_file() {
            return Err(Error::checkpoint(format!(
                "{} does not contain {}",
                path.display(),
                CHECKPOINT_FILE
            )));
        }
        let metadata_path = path.join(METADATA_FILE);
        let metadata = if metadata_path.is_file() {
            serde_json::from_slice(&fs::read(&metadata_path)?)?
        } else {
            CheckpointMetadata::new()
        };
        Ok(Checkpoint {
            metadata,
            repr: CheckpointRepr::Directory(path),
        })
    }

    /// Load the payload map, reading from disk for directory checkpoints.
    pub fn to_dict(&self) -> Result<CheckpointData> {
        match &self.repr {
            CheckpointRepr::Data(payload) => Ok(payload.clone()),
            CheckpointRepr::Directory(dir) => {
                let path = dir.join(CHECKPOINT_FILE);
                let bytes = fs::read(&path).map_err(|e| {
                    Error::checkpoint(format!("cannot read {}: {}", path.display(), e))
                })?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }

    /// Write the canonical file pair into `path`, creating it if needed.
    pub fn to_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let payload = self.to_dict()?;
        fs::write(
            path.join(CHECKPOINT_FILE),
            serde_json::to_vec_pretty(&payload)?,
        )?;
        fs::write(
            path.join(METADATA_FILE),
            serde_json::to_vec_pretty(&self.metadata)?,
        )?;
        debug!(
            checkpoint_id = %self.metadata.checkpoint_id,
            path = %path.display(),
            "materialized checkpoint"
        );
        Ok(())
    }

    /// Expose the checkpoint as a directory for the scope of the guard.
    ///
    /// In-memory checkpoints are written to a fresh temporary directory that
    /// is removed when the guard drops, even on early return or panic
    /// unwind. Directory checkpoints hand back their own path and the guard
    /// drop leaves it untouched.
    pub fn as_directory(&self) -> Result<CheckpointDirectory> {
        match &self.repr {
            CheckpointRepr::Directory(dir) => Ok(CheckpointDirectory {
                path: dir.clone(),
                temp: None,
            }),
            CheckpointRepr::Data(_) => {
                let temp = TempDir::new()?;
                self.to_directory(temp.path())?;
                Ok(CheckpointDirectory {
                    path: temp.path().to_path_buf(),
                    temp: Some(temp),
                })
            }
        }
    }

    /// Encode to self-describing bytes for transfer or storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from bytes produced by [`Checkpoint::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Unique checkpoint identifier.
    pub fn id(&self) -> Uuid {
        self.metadata.checkpoint_id
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    /// The backing directory, if this checkpoint is directory-backed.
    pub fn directory(&self) -> Option<&Path> {
        match &self.repr {
            CheckpointRepr::Directory(dir) => Some(dir),
            CheckpointRepr::Data(_) => None,
        }
    }
}

impl Serialize for Checkpoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let payload = self.to_dict().map_err(S::Error::custom)?;
        CheckpointWire {
            metadata: self.metadata.clone(),
            payload,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Checkpoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = CheckpointWire::deserialize(deserializer)?;
        Ok(Checkpoint {
            metadata: wire.metadata,
            repr: CheckpointRepr::Data(wire.payload),
        })
    }
}

/// Scoped directory view of a checkpoint.
///
/// Holds the temporary directory alive for materialized in-memory
/// checkpoints; dropping the guard removes it. For directory-backed
/// checkpoints the guard only borrows the caller's path.
#[derive(Debug)]
pub struct CheckpointDirectory {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl CheckpointDirectory {
    /// Path of the materialized checkpoint.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory is removed when this guard drops.
    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

impl AsRef<Path> for CheckpointDirectory {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
