pub(crate) use super::{DenseMatrix, DenseMatrixError};

mod errors;
mod support;
