//! Parquet fixtures for CLI tests.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_writer::ArrowWriter;
use tempfile::TempDir;

/// Four points on the diagonal: (0,0), (1,1), (2,2), (3,3).
pub(super) const DIAGONAL: [f32; 8] = [0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0];

/// Writes `values` as a `features: FixedSizeList<Float32, dimension>` column.
///
/// # Errors
/// Returns an error when the file cannot be created or the Parquet writer fails
/// to write the batch.
pub(super) fn create_parquet_file(
    dir: &TempDir,
    name: &str,
    values: &[f32],
    dimension: i32,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.path().join(name);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let list_type = DataType::FixedSizeList(item_field.clone(), dimension);
    let schema = Arc::new(Schema::new(vec![Field::new("features", list_type, false)]));
    let list = FixedSizeListArray::try_new(
        item_field,
        dimension,
        Arc::new(Float32Array::from(values.to_vec())) as ArrayRef,
        None,
    )?;
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(list) as ArrayRef])?;
    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(path)
}

/// Writes the [`DIAGONAL`] points to `points.parquet`.
pub(super) fn create_diagonal_file(dir: &TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    create_parquet_file(dir, "points.parquet", &DIAGONAL, 2)
}
