//! Batch and dataset types for scoring.
//!
//! A [`DataBatch`] is the unit handed to a predictor: either a plain vector
//! of scalars or a set of equal-length named columns. A [`Dataset`] is an
//! ordered sequence of batches (its partitions); partition order defines row
//! order across the whole dataset.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column name used when converting scalar batches to Arrow.
pub const VALUE_COLUMN: &str = "value";

/// One batch of numeric data.
///
/// Scalar batches model a single unnamed feature; column batches model
/// named features with one value per row. All columns in a batch have the
/// same length. [`DataBatch::columns`] is the checked constructor for the
/// column form; building the `Columns` variant directly bypasses the
/// length check that [`len`](DataBatch::len), [`slice`](DataBatch::slice),
/// and [`concat`](DataBatch::concat) rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataBatch {
    /// A single unnamed column of values.
    Scalars(Vec<f64>),
    /// Named columns, all of equal length. Construct via
    /// [`DataBatch::columns`] to keep the length invariant.
    Columns(BTreeMap<String, Vec<f64>>),
}

/// Shape of a batch, used to check that batches can be concatenated.
#[derive(Debug, Clone, PartialEq)]
enum BatchShape {
    Scalars,
    Columns(Vec<String>),
}

impl DataBatch {
    /// Create a scalar batch.
    pub fn scalars<I: IntoIterator<Item = f64>>(values: I) -> Self {
        DataBatch::Scalars(values.into_iter().collect())
    }

    /// Create a column batch, validating that all columns share one length.
    pub fn columns(columns: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::data("column batch must have at least one column"));
        }
        let mut lengths = columns.values().map(Vec::len);
        let first = lengths.next().unwrap_or(0);
        if lengths.any(|len| len != first) {
            return Err(Error::data(format!(
                "column length mismatch: expected {} rows in every column",
                first
            )));
        }
        Ok(DataBatch::Columns(columns))
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        match self {
            DataBatch::Scalars(values) => values.len(),
            DataBatch::Columns(columns) => {
                columns.values().next().map(Vec::len).unwrap_or(0)
            }
        }
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a named column. Scalar batches expose their values under
    /// [`VALUE_COLUMN`].
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match self {
            DataBatch::Scalars(values) if name == VALUE_COLUMN => Some(values),
            DataBatch::Scalars(_) => None,
            DataBatch::Columns(columns) => columns.get(name).map(Vec::as_slice),
        }
    }

    /// Apply `f` to every value, preserving shape.
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> DataBatch {
        match self {
            DataBatch::Scalars(values) => {
                DataBatch::Scalars(values.iter().copied().map(&f).collect())
            }
            DataBatch::Columns(columns) => DataBatch::Columns(
                columns
                    .iter()
                    .map(|(name, values)| {
                        (name.clone(), values.iter().copied().map(&f).collect())
                    })
                    .collect(),
            ),
        }
    }

    /// Flatten to a plain vector of values, in row order.
    ///
    /// Works for scalar batches and single-column batches; flattening a
    /// multi-column batch is ambiguous and returns a data error.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        match self {
            DataBatch::Scalars(values) => Ok(values.clone()),
            DataBatch::Columns(columns) if columns.len() == 1 => {
                Ok(columns.values().next().map(Vec::clone).unwrap_or_default())
            }
            DataBatch::Columns(columns) => Err(Error::data(format!(
                "cannot flatten batch with {} columns",
                columns.len()
            ))),
        }
    }

    /// Copy out `len` rows starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the row count.
    pub fn slice(&self, offset: usize, len: usize) -> DataBatch {
        match self {
            DataBatch::Scalars(values) => {
                DataBatch::Scalars(values[offset..offset + len].to_vec())
            }
            DataBatch::Columns(columns) => DataBatch::Columns(
                columns
                    .iter()
                    .map(|(name, values)| {
                        (name.clone(), values[offset..offset + len].to_vec())
                    })
                    .collect(),
            ),
        }
    }

    /// Concatenate batches row-wise. Zero-row batches are skipped; the
    /// remaining batches must share one shape.
    pub fn concat(batches: &[DataBatch]) -> Result<DataBatch> {
        let mut populated = batches.iter().filter(|b| !b.is_empty());
        let Some(first) = populated.next() else {
            return Ok(DataBatch::Scalars(Vec::new()));
        };
        let shape = first.shape();
        let mut merged = first.clone();
        for batch in populated {
            if batch.shape() != shape {
                return Err(Error::data(
                    "cannot concatenate batches with different shapes",
                ));
            }
            match (&mut merged, batch) {
                (DataBatch::Scalars(out), DataBatch::Scalars(values)) => {
                    out.extend_from_slice(values);
                }
                (DataBatch::Columns(out), DataBatch::Columns(columns)) => {
                    for (name, values) in columns {
                        if let Some(col) = out.get_mut(name) {
                            col.extend_from_slice(values);
                        }
                    }
                }
                _ => unreachable!("shape checked above"),
            }
        }
        Ok(merged)
    }

    /// Convert to an Arrow [`RecordBatch`] with Float64 columns.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        match self {
            DataBatch::Scalars(values) => {
                let schema = Schema::new(vec![Field::new(
                    VALUE_COLUMN,
                    DataType::Float64,
                    false,
                )]);
                let array = Float64Array::from_iter_values(values.iter().copied());
                RecordBatch::try_new(Arc::new(schema), vec![Arc::new(array) as ArrayRef])
                    .map_err(Error::from)
            }
            DataBatch::Columns(columns) => {
                let mut fields = Vec::with_capacity(columns.len());
                let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
                for (name, values) in columns {
                    fields.push(Field::new(name, DataType::Float64, false));
                    arrays.push(Arc::new(Float64Array::from_iter_values(
                        values.iter().copied(),
                    )));
                }
                RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
                    .map_err(Error::from)
            }
        }
    }

    /// Build a batch from an Arrow [`RecordBatch`] of non-null Float64
    /// columns. A batch whose only column is [`VALUE_COLUMN`] comes back as
    /// a scalar batch.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let mut columns = BTreeMap::new();
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let array = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    Error::data(format!(
                        "column {:?} has type {}, expected Float64",
                        field.name(),
                        field.data_type()
                    ))
                })?;
            if array.null_count() > 0 {
                return Err(Error::data(format!(
                    "column {:?} contains nulls",
                    field.name()
                )));
            }
            columns.insert(field.name().clone(), array.values().to_vec());
        }
        if columns.len() == 1 && columns.contains_key(VALUE_COLUMN) {
            let values = columns.remove(VALUE_COLUMN).unwrap_or_default();
            return Ok(DataBatch::Scalars(values));
        }
        DataBatch::columns(columns)
    }

    fn shape(&self) -> BatchShape {
        match self {
            DataBatch::Scalars(_) => BatchShape::Scalars,
            DataBatch::Columns(columns) => {
                BatchShape::Columns(columns.keys().cloned().collect())
            }
        }
    }
}

/// An ordered collection of [`DataBatch`] partitions.
///
/// Row order is the concatenation of partitions in index order, and every
/// operation here preserves it. Empty partitions are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    partitions: Vec<DataBatch>,
}

impl Dataset {
    /// Build a single-partition dataset from scalar items.
    pub fn from_items<I: IntoIterator<Item = f64>>(items: I) -> Self {
        Dataset {
            partitions: vec![DataBatch::scalars(items)],
        }
    }

    /// Build a dataset from existing batches, one partition per batch.
    pub fn from_batches(batches: Vec<DataBatch>) -> Self {
        Dataset { partitions: batches }
    }

    /// Number of partitions.
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Total row count across all partitions.
    pub fn num_rows(&self) -> usize {
        self.partitions.iter().map(DataBatch::len).sum()
    }

    /// Whether the dataset holds no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Borrow the partitions in order.
    pub fn partitions(&self) -> &[DataBatch] {
        &self.partitions
    }

    /// Take ownership of the partitions in order.
    pub fn into_partitions(self) -> Vec<DataBatch> {
        self.partitions
    }

    /// Redistribute rows into exactly `n` partitions.
    ///
    /// Global row order is unchanged; sizes differ by at most one row, with
    /// earlier partitions taking the remainder. When `n` exceeds the row
    /// count the tail partitions are empty.
    pub fn repartition(self, n: usize) -> Result<Dataset> {
        if n == 0 {
            return Err(Error::data("partition count must be at least 1"));
        }
        let merged = DataBatch::concat(&self.partitions)?;
        let rows = merged.len();
        let base = rows / n;
        let extra = rows % n;
        let mut partitions = Vec::with_capacity(n);
        let mut offset = 0;
        for index in 0..n {
            let len = base + usize::from(index < extra);
            partitions.push(merged.slice(offset, len));
            offset += len;
        }
        Ok(Dataset { partitions })
    }

    /// Flatten every partition to a single vector of values, in row order.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.num_rows());
        for partition in &self.partitions {
            values.extend(partition.to_f64_vec()?);
        }
        Ok(values)
    }

    /// Merge all partitions into one Arrow [`RecordBatch`].
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        DataBatch::concat(&self.partitions)?.to_record_batch()
    }
}
