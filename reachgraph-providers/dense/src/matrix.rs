//! Owned row-major matrix and its Arrow/Parquet constructors.
use std::{fs::File, path::Path};

use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchReader};
use parquet::arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder};
use parquet::file::reader::ChunkReader;
use reachgraph_core::{PointSet, PointSetError};

use crate::errors::DenseMatrixError;
use crate::ingest::{append_rows, validate_field};

/// Dense point matrix backed by a contiguous row-major buffer.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array};
/// use arrow_schema::{DataType, Field};
/// use reachgraph_providers_dense::DenseMatrix;
///
/// let values = Float32Array::from(vec![0.0_f32, 0.0, 3.0, 4.0]);
/// let item = Arc::new(Field::new("item", DataType::Float32, false));
/// let list = FixedSizeListArray::new(item, 2, Arc::new(values) as ArrayRef, None);
///
/// let matrix = DenseMatrix::try_from_fixed_size_list("demo", &list)?;
/// let points = matrix.points()?;
/// assert_eq!(points.rows(), 2);
/// assert_eq!(points.row(1), Some(&[3.0, 4.0][..]));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    name: String,
    rows: usize,
    dimension: usize,
    values: Vec<f32>,
}

impl DenseMatrix {
    fn from_parts(name: impl Into<String>, rows: usize, dimension: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), rows.saturating_mul(dimension));
        Self {
            name: name.into(),
            rows,
            dimension,
            values,
        }
    }

    /// Returns the name given at load time.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the width of each row.
    ///
    /// Zero when the matrix was read from zero record batches.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the underlying row-major buffer.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Borrows the matrix as a validated point set.
    ///
    /// # Errors
    /// Returns [`PointSetError::NonFinite`] when a value is NaN or infinite.
    pub fn points(&self) -> Result<PointSet<'_>, PointSetError> {
        PointSet::new(&self.values, self.rows, self.dimension)
    }

    /// Loads data from an Arrow [`FixedSizeListArray`].
    ///
    /// # Errors
    /// Returns [`DenseMatrixError`] for non-`Float32` items, null rows or
    /// values, and invalid widths.
    pub fn try_from_fixed_size_list(
        name: impl Into<String>,
        array: &FixedSizeListArray,
    ) -> Result<Self, DenseMatrixError> {
        let mut values = Vec::new();
        let dimension = append_rows(array, None, 0, &mut values)?;
        Ok(Self::from_parts(name, array.len(), dimension, values))
    }

    /// Loads `column` from a sequence of record batches.
    ///
    /// # Errors
    /// Returns [`DenseMatrixError`] when a batch lacks the column, its type
    /// is wrong, or batch widths disagree.
    pub fn try_from_record_batches<I>(
        name: impl Into<String>,
        column: &str,
        batches: I,
    ) -> Result<Self, DenseMatrixError>
    where
        I: IntoIterator<Item = RecordBatch>,
    {
        let mut values = Vec::new();
        let mut rows = 0_usize;
        let mut dimension = None;
        for batch in batches {
            let schema = batch.schema();
            let index = column_index(&schema, column)?;
            let width = validate_field(schema.field(index), column)?;
            let expected = *dimension.get_or_insert(width);
            let list = downcast_list(batch.column(index), column)?;
            append_rows(list, Some(expected), rows, &mut values)?;
            rows += list.len();
        }
        Ok(Self::from_parts(name, rows, dimension.unwrap_or(0), values))
    }

    /// Loads `column` from the Parquet file at `path`.
    ///
    /// # Errors
    /// Returns [`DenseMatrixError::Io`] when the file cannot be opened and
    /// the errors of [`DenseMatrix::try_from_parquet_reader`] otherwise.
    pub fn try_from_parquet_path(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        column: &str,
    ) -> Result<Self, DenseMatrixError> {
        let file = File::open(path)?;
        Self::try_from_parquet_reader(name, file, column)
    }

    /// Loads `column` from a Parquet reader, reading only that column.
    ///
    /// # Errors
    /// Returns [`DenseMatrixError`] for Parquet decoding failures, a missing
    /// or mistyped column, and null data.
    pub fn try_from_parquet_reader<R>(
        name: impl Into<String>,
        reader: R,
        column: &str,
    ) -> Result<Self, DenseMatrixError>
    where
        R: ChunkReader + Send + 'static,
    {
        let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
        let mask = ProjectionMask::columns(builder.parquet_schema(), [column]);
        let reader = builder.with_projection(mask).build()?;
        let schema = reader.schema();
        let index = column_index(&schema, column)?;
        let dimension = validate_field(schema.field(index), column)?;

        let mut values = Vec::new();
        let mut rows = 0_usize;
        for batch in reader {
            let batch = batch?;
            let list = downcast_list(batch.column(index), column)?;
            append_rows(list, Some(dimension), rows, &mut values)?;
            rows += list.len();
        }
        Ok(Self::from_parts(name, rows, dimension, values))
    }
}

fn column_index(schema: &arrow_schema::Schema, column: &str) -> Result<usize, DenseMatrixError> {
    schema
        .index_of(column)
        .map_err(|_| DenseMatrixError::ColumnNotFound {
            column: column.to_owned(),
        })
}

fn downcast_list<'a>(
    array: &'a dyn Array,
    column: &str,
) -> Result<&'a FixedSizeListArray, DenseMatrixError> {
    array
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| DenseMatrixError::InvalidColumnType {
            column: column.to_owned(),
            actual: array.data_type().clone(),
        })
}
