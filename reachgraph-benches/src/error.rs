//! Benchmark setup error type.
//!
//! Aggregates the errors that may arise while preparing benchmark inputs so
//! setup functions can propagate failures with `?` instead of `.expect()`.

use crate::source::SyntheticError;
use reachgraph_core::{DeviceError, PointSetError, ReachGraphError};

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Synthetic data generation failed.
    #[error("synthetic source generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
    /// The generated buffer was not a valid point set.
    #[error("generated points were rejected: {0}")]
    Points(#[from] PointSetError),
    /// Graph configuration or construction failed.
    #[error("graph construction failed: {0}")]
    Graph(#[from] ReachGraphError),
    /// The neighbour search failed on a device.
    #[error("neighbour search failed: {0}")]
    Device(#[from] DeviceError),
    /// A zero value was passed where a non-zero integer was required.
    #[error("expected a non-zero value for {context}")]
    ZeroValue {
        /// A description of the parameter that was unexpectedly zero.
        context: &'static str,
    },
}
