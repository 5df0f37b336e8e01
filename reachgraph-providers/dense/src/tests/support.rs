use super::{DenseMatrix, DenseMatrixError};
use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::arrow::arrow_writer::ArrowWriter;
use std::sync::Arc;

pub(crate) fn list_array(rows: &[Vec<f32>], dimension: usize) -> FixedSizeListArray {
    assert!(rows.iter().all(|row| row.len() == dimension));
    let values = Float32Array::from_iter_values(rows.iter().flatten().copied());
    FixedSizeListArray::new(
        Arc::new(Field::new("item", DataType::Float32, false)),
        i32::try_from(dimension).expect("dimension fits in i32"),
        Arc::new(values) as ArrayRef,
        None,
    )
}

pub(crate) fn feature_field(dimension: usize, child_nullable: bool, list_nullable: bool) -> Field {
    Field::new(
        "features",
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, child_nullable)),
            i32::try_from(dimension).expect("dimension fits in i32"),
        ),
        list_nullable,
    )
}

pub(crate) fn feature_batch(rows: &[Vec<f32>], dimension: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![feature_field(dimension, false, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(list_array(rows, dimension)) as ArrayRef])
        .expect("batch")
}

pub(crate) fn write_batches(batches: &[RecordBatch]) -> Bytes {
    let schema = batches.first().expect("at least one batch").schema();
    let mut buffer = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, None).expect("writer");
        for batch in batches {
            writer.write(batch).expect("write");
        }
        writer.close().expect("close");
    }
    Bytes::from(buffer)
}

pub(crate) fn load(bytes: Bytes, column: &str) -> Result<DenseMatrix, DenseMatrixError> {
    DenseMatrix::try_from_parquet_reader("demo", bytes, column)
}
