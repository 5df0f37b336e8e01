//! Row-major `f32` point matrices loaded from Arrow and Parquet.
//!
//! [`DenseMatrix`] owns a contiguous buffer of `rows × dimension` values
//! read from a `FixedSizeList<Float32, D>` column and lends it to the graph
//! pipeline as a [`reachgraph_core::PointSet`].

mod errors;
mod ingest;
mod matrix;

pub use errors::DenseMatrixError;
pub use matrix::DenseMatrix;

#[cfg(test)]
mod tests;
