//! Exhaustive CPU nearest-neighbour search.

use std::collections::BinaryHeap;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{
    device::DeviceId,
    error::DeviceError,
    points::{PointSet, squared_norm},
};

use super::{Neighbour, NeighbourSearch, SearchRequest, WideIndex};

/// Exact k-nearest-neighbour search by exhaustive comparison.
///
/// Distances are Euclidean, evaluated through the expanded identity
/// `‖a‖² + ‖b‖² − 2a·b` with `f64` accumulation. Rounding can push the
/// expanded value slightly below zero; it is clamped before the square root.
/// Every query row is independent and rows run in parallel on the Rayon pool
/// of the calling thread, so a worker inside a device pool searches on that
/// pool.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use reachgraph_core::{
///     BruteForceKnn, DeviceId, DistanceMetric, NeighbourSearch, PointSet, SearchRequest,
/// };
///
/// let values = [0.0, 0.0, 3.0, 4.0, 0.0, 1.0];
/// let points = PointSet::new(&values, 3, 2)?;
/// let k = NonZeroUsize::new(2).expect("non-zero");
/// let request = SearchRequest::self_search(points, k, DistanceMetric::L2SqrtExpanded);
/// let knn = BruteForceKnn.search(DeviceId::default(), &request)?;
/// assert_eq!(&knn.indices()[..2], &[0, 2]);
/// assert_eq!(&knn.distances()[..2], &[0.0, 1.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BruteForceKnn;

impl NeighbourSearch for BruteForceKnn {
    #[instrument(
        name = "core.knn.brute_force",
        err,
        skip(self, device, request, indices, distances),
        fields(
            device = %device,
            queries = request.queries.rows(),
            references = request.reference.rows(),
            k = request.k.get(),
        ),
    )]
    fn search_into(
        &self,
        device: DeviceId,
        request: &SearchRequest<'_>,
        indices: &mut [WideIndex],
        distances: &mut [f32],
    ) -> Result<(), DeviceError> {
        request.validate(device, indices.len(), distances.len())?;
        if request.queries.is_empty() {
            return Ok(());
        }
        let k = request.k.get();
        let reference_norms = request.reference.squared_norms();
        indices
            .par_chunks_mut(k)
            .zip(distances.par_chunks_mut(k))
            .enumerate()
            .try_for_each(|(query, (row_indices, row_distances))| {
                let nearest = nearest_for_query(request, &reference_norms, query)?;
                for (slot, neighbour) in nearest.into_iter().enumerate() {
                    row_indices[slot] = WideIndex::try_from(neighbour.id).map_err(|_| {
                        DeviceError::SearchFailed {
                            device,
                            reason: format!("neighbour id {} exceeds i64", neighbour.id).into(),
                        }
                    })?;
                    row_distances[slot] = neighbour.distance;
                }
                Ok(())
            })?;
        debug!(outputs = indices.len(), "brute-force search complete");
        Ok(())
    }
}

fn nearest_for_query(
    request: &SearchRequest<'_>,
    reference_norms: &[f64],
    query: usize,
) -> Result<Vec<Neighbour>, DeviceError> {
    let k = request.k.get();
    let query_row = row_of(request.queries, query);
    let query_norm = squared_norm(query_row);
    let self_row = request.self_offset.map(|offset| offset + query);
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (reference, (reference_row, &reference_norm)) in request
        .reference
        .iter_rows()
        .zip(reference_norms)
        .enumerate()
    {
        let distance = if self_row == Some(reference) {
            0.0
        } else {
            expanded_euclidean(query_row, query_norm, reference_row, reference_norm)
        };
        if !distance.is_finite() {
            return Err(DeviceError::NonFiniteDistance { query, reference });
        }
        let candidate = Neighbour {
            id: reference,
            distance,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }
    Ok(heap.into_sorted_vec())
}

fn row_of<'a>(points: PointSet<'a>, row: usize) -> &'a [f32] {
    points.row(row).unwrap_or_default()
}

/// Euclidean distance from precomputed squared norms.
pub(crate) fn expanded_euclidean(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> f32 {
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let squared = (a_norm + b_norm - 2.0 * dot).max(0.0);
    // Values beyond f32::MAX become infinity and are rejected by the caller.
    squared.sqrt() as f32
}
