use arrow_schema::{ArrowError, DataType};
use thiserror::Error;

/// Failures raised while loading a dense matrix.
#[derive(Debug, Error)]
pub enum DenseMatrixError {
    /// The requested column is absent from the schema.
    #[error("column `{column}` not found in Parquet schema")]
    ColumnNotFound {
        /// Requested column name.
        column: String,
    },
    /// The column is not a fixed-size list.
    #[error("column `{column}` must be a FixedSizeList<Float32, _> but found {actual:?}")]
    InvalidColumnType {
        /// Requested column name.
        column: String,
        /// Type found in the schema.
        actual: DataType,
    },
    /// The list items are not `Float32`.
    #[error("FixedSizeList child type must be Float32 but found {actual:?}")]
    InvalidListValueType {
        /// Item type found in the schema.
        actual: DataType,
    },
    /// The list width cannot be used as a dimension.
    #[error("invalid FixedSizeList dimension {actual}")]
    InvalidDimension {
        /// Declared list width.
        actual: i32,
    },
    /// The column or its items are declared nullable.
    #[error("column `{column}` must not be nullable (nullable items: {nullable_child})")]
    NullableField {
        /// Requested column name.
        column: String,
        /// Whether the list items, rather than the rows, are nullable.
        nullable_child: bool,
    },
    /// A row is null.
    #[error("row {row} is null")]
    NullRow {
        /// Absolute row index.
        row: usize,
    },
    /// A row contains a null value.
    #[error("row {row} contains null value at position {value_index}")]
    NullValue {
        /// Absolute row index.
        row: usize,
        /// Feature index of the first null.
        value_index: usize,
    },
    /// The matrix would not fit in memory.
    #[error("matrix with {rows} rows and dimension {dimension} exceeds capacity limits")]
    CapacityOverflow {
        /// Rows in the offending batch.
        rows: usize,
        /// Row width.
        dimension: usize,
    },
    /// Record batches disagree on the row width.
    #[error("inconsistent dimensions across batches: expected {expected}, got {actual}")]
    InconsistentBatchDimension {
        /// Width of the first batch.
        expected: usize,
        /// Width of the offending batch.
        actual: usize,
    },
    /// Arrow failure.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
    /// Parquet failure.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    /// I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
