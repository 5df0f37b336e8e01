//! Core-distance extraction from sorted neighbourhoods.
//!
//! A point's core distance is the distance to its `min_samples`-th nearest
//! neighbour, counting the point itself as the first. With neighbour rows
//! sorted ascending this is column `min_samples - 1` of the distance matrix.

use rayon::prelude::*;
use tracing::instrument;

use crate::error::{ReachGraphError, Result};

/// Checks that a neighbourhood of `n_neighbors` can supply `min_samples`.
///
/// # Errors
/// - [`ReachGraphError::InvalidMinSamples`] when `min_samples == 0`.
/// - [`ReachGraphError::MinSamplesExceedsNeighbourhood`] when
///   `n_neighbors < min_samples`.
pub fn validate_neighbourhood(min_samples: usize, n_neighbors: usize) -> Result<()> {
    if min_samples == 0 {
        return Err(ReachGraphError::InvalidMinSamples { got: min_samples });
    }
    if n_neighbors < min_samples {
        return Err(ReachGraphError::MinSamplesExceedsNeighbourhood {
            min_samples,
            n_neighbors,
        });
    }
    Ok(())
}

/// Extracts the core distance of each of the `n` points.
///
/// `knn_distances` is the row-major `n × n_neighbors` distance matrix with
/// rows sorted ascending. The input is not modified, so repeated calls
/// return identical results.
///
/// # Errors
/// - Neighbourhood errors from [`validate_neighbourhood`].
/// - [`ReachGraphError::ShapeMismatch`] when `knn_distances` does not hold
///   `n × n_neighbors` values.
///
/// # Examples
/// ```
/// use reachgraph_core::core_distances;
///
/// let distances = [0.0, 1.0, 4.0, 0.0, 2.0, 3.0];
/// assert_eq!(core_distances(&distances, 2, 3, 2)?, vec![1.0, 2.0]);
/// # Ok::<(), reachgraph_core::ReachGraphError>(())
/// ```
#[instrument(
    name = "core.core_distances",
    err,
    skip(knn_distances),
    fields(values = knn_distances.len()),
)]
pub fn core_distances(
    knn_distances: &[f32],
    min_samples: usize,
    n_neighbors: usize,
    n: usize,
) -> Result<Vec<f32>> {
    validate_neighbourhood(min_samples, n_neighbors)?;
    let expected = n.saturating_mul(n_neighbors);
    if knn_distances.len() != expected {
        return Err(ReachGraphError::ShapeMismatch {
            buffer: "knn_distances",
            expected,
            actual: knn_distances.len(),
        });
    }
    let column = min_samples - 1;
    Ok(knn_distances
        .par_chunks_exact(n_neighbors)
        .map(|row| row[column])
        .collect())
}
