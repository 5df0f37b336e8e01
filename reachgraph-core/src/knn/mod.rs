//! Exact k-nearest-neighbour search.
//!
//! [`NeighbourSearch`] is the capability the pipeline consumes: given a
//! reference set, a query set, `k`, and a metric, fill row-major
//! `queries × k` buffers with neighbour ids (in the wide [`WideIndex`] type)
//! and distances, each row sorted ascending by distance with ties resolved
//! towards the lower id. [`BruteForceKnn`] is the shipped CPU engine.
//!
//! The pipeline works with the narrower [`PointIndex`]; [`narrow_indices`]
//! converts search output after completion and refuses to truncate.

mod brute_force;
mod narrow;

use std::{cmp::Ordering, num::NonZeroUsize};

pub use self::{
    brute_force::BruteForceKnn,
    narrow::{MAX_POINTS, ensure_indexable, narrow_indices},
};

use crate::{
    device::DeviceId,
    error::{DeviceError, Result},
    metric::DistanceMetric,
    points::PointSet,
};

/// Integer type used for point ids throughout the graph.
pub type PointIndex = u32;

/// Integer type produced by the nearest-neighbour search primitive.
pub type WideIndex = i64;

/// Neighbour discovered during a search, including its distance from the query.
///
/// Ordered by distance, then id, so sorting and heap eviction are
/// deterministic under ties.
///
/// # Examples
/// ```
/// use reachgraph_core::Neighbour;
///
/// let near = Neighbour { id: 3, distance: 0.5 };
/// let tie = Neighbour { id: 1, distance: 0.5 };
/// assert!(tie < near);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    /// Row of the neighbour within the reference set.
    pub id: usize,
    /// Distance between the query and [`Neighbour::id`].
    pub distance: f32,
}

impl Eq for Neighbour {}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single nearest-neighbour search.
#[derive(Clone, Copy, Debug)]
pub struct SearchRequest<'a> {
    /// Points searched against.
    pub reference: PointSet<'a>,
    /// Points whose neighbours are requested.
    pub queries: PointSet<'a>,
    /// Neighbours returned per query.
    pub k: NonZeroUsize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// When `Some(offset)`, query row `q` is reference row `offset + q`; its
    /// self distance is reported as exactly zero.
    pub self_offset: Option<usize>,
}

impl<'a> SearchRequest<'a> {
    /// Creates a request searching `points` against itself.
    #[must_use]
    pub fn self_search(points: PointSet<'a>, k: NonZeroUsize, metric: DistanceMetric) -> Self {
        Self {
            reference: points,
            queries: points,
            k,
            metric,
            self_offset: Some(0),
        }
    }

    /// Creates a request searching `queries` against a distinct `reference`.
    #[must_use]
    pub fn new(
        reference: PointSet<'a>,
        queries: PointSet<'a>,
        k: NonZeroUsize,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            reference,
            queries,
            k,
            metric,
            self_offset: None,
        }
    }

    /// Returns the number of output slots (`queries × k`).
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.queries.rows().saturating_mul(self.k.get())
    }

    /// Checks the request against the search contract.
    ///
    /// # Errors
    /// Returns the [`DeviceError`] describing the first violated rule.
    pub fn validate(
        &self,
        device: DeviceId,
        indices: usize,
        distances: usize,
    ) -> core::result::Result<(), DeviceError> {
        if !self.metric.is_supported() {
            return Err(DeviceError::UnsupportedMetric {
                device,
                metric: self.metric,
            });
        }
        if !self.queries.is_empty() && self.reference.dimension() != self.queries.dimension() {
            return Err(DeviceError::DimensionMismatch {
                reference: self.reference.dimension(),
                queries: self.queries.dimension(),
            });
        }
        if !self.queries.is_empty() && self.k.get() > self.reference.rows() {
            return Err(DeviceError::NeighbourhoodTooLarge {
                k: self.k.get(),
                reference_rows: self.reference.rows(),
            });
        }
        let expected = self.output_len();
        if indices != expected || distances != expected {
            return Err(DeviceError::OutputLengthMismatch {
                expected,
                actual: if indices == expected { distances } else { indices },
            });
        }
        Ok(())
    }
}

/// Exact nearest-neighbour search capability.
pub trait NeighbourSearch: Sync {
    /// Runs `request` on `device`, writing `queries × k` results into the
    /// supplied row-major buffers.
    ///
    /// On success every row is sorted ascending by distance. On failure the
    /// contents of the output buffers are unspecified and must not be used.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] when the request is invalid or the search
    /// fails on the device.
    fn search_into(
        &self,
        device: DeviceId,
        request: &SearchRequest<'_>,
        indices: &mut [WideIndex],
        distances: &mut [f32],
    ) -> core::result::Result<(), DeviceError>;

    /// Runs `request` and returns freshly allocated results.
    ///
    /// # Errors
    /// Propagates failures from [`NeighbourSearch::search_into`].
    fn search(
        &self,
        device: DeviceId,
        request: &SearchRequest<'_>,
    ) -> core::result::Result<WideKnn, DeviceError> {
        let len = request.output_len();
        let mut indices = vec![0; len];
        let mut distances = vec![0.0; len];
        self.search_into(device, request, &mut indices, &mut distances)?;
        Ok(WideKnn::from_parts(
            request.queries.rows(),
            request.k.get(),
            indices,
            distances,
        ))
    }
}

/// Raw search output with wide neighbour ids.
#[derive(Clone, Debug, PartialEq)]
pub struct WideKnn {
    rows: usize,
    k: usize,
    indices: Vec<WideIndex>,
    distances: Vec<f32>,
}

impl WideKnn {
    pub(crate) fn from_parts(
        rows: usize,
        k: usize,
        indices: Vec<WideIndex>,
        distances: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(indices.len(), rows * k);
        debug_assert_eq!(distances.len(), rows * k);
        Self {
            rows,
            k,
            indices,
            distances,
        }
    }

    /// Returns the number of query rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the neighbours per row.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the row-major neighbour ids.
    #[must_use]
    pub fn indices(&self) -> &[WideIndex] {
        &self.indices
    }

    /// Returns the row-major distances.
    #[must_use]
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Narrows the neighbour ids into a [`KnnResult`].
    ///
    /// # Errors
    /// Returns [`crate::ReachGraphError::IndexOutOfRange`] when an id cannot be
    /// represented as a [`PointIndex`].
    pub fn narrow(self) -> Result<KnnResult> {
        let indices = narrow_indices(&self.indices)?;
        Ok(KnnResult {
            rows: self.rows,
            k: self.k,
            indices,
            distances: self.distances,
        })
    }
}

/// Search output with ids in the working [`PointIndex`] width.
#[derive(Clone, Debug, PartialEq)]
pub struct KnnResult {
    rows: usize,
    k: usize,
    indices: Vec<PointIndex>,
    distances: Vec<f32>,
}

impl KnnResult {
    /// Returns the number of query rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the neighbours per row.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the row-major neighbour ids.
    #[must_use]
    pub fn indices(&self) -> &[PointIndex] {
        &self.indices
    }

    /// Returns the row-major distances.
    #[must_use]
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Returns the neighbours of row `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<(&[PointIndex], &[f32])> {
        let start = row.checked_mul(self.k)?;
        let end = start.checked_add(self.k)?;
        Some((self.indices.get(start..end)?, self.distances.get(start..end)?))
    }

    /// Splits the result into `(indices, distances)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<PointIndex>, Vec<f32>) {
        (self.indices, self.distances)
    }
}
