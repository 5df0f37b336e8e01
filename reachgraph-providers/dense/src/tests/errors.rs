use super::DenseMatrixError;
use arrow_schema::ArrowError;
use parquet::errors::ParquetError;
use rstest::rstest;
use std::io;

#[rstest]
#[case::arrow(DenseMatrixError::from(ArrowError::ComputeError("boom".into())), "arrow error")]
#[case::parquet(DenseMatrixError::from(ParquetError::General("boom".into())), "parquet error")]
#[case::io(DenseMatrixError::from(io::Error::other("boom")), "i/o error")]
fn wraps_library_errors(#[case] err: DenseMatrixError, #[case] prefix: &str) {
    let message = err.to_string();
    assert!(message.starts_with(prefix), "{message}");
    assert!(message.ends_with("boom"), "{message}");
}
