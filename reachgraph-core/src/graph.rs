//! The mutual-reachability graph and its assembly from neighbour rows.

use tracing::instrument;

use crate::{
    builder::ReachGraphBuilder,
    core_distance::core_distances,
    error::Result,
    knn::{KnnResult, PointIndex},
    metric::DistanceMetric,
    points::PointSet,
    reachability::transform,
    sparse::{CooGraph, CsrConversion, Symmetrize, knn_to_coo, saturate_self_loops},
};

/// Symmetric mutual-reachability graph in CSR form with per-point core
/// distances.
///
/// `graph` is sorted by `(row, col)`, so row `r` occupies
/// `indptr[r]..indptr[r + 1]` of its `cols` and `vals`. Every directed pair
/// appears at most once, `(r, c)` and `(c, r)` carry the same weight, and
/// self-loops weigh `f32::MAX`.
///
/// Each undirected edge is therefore stored twice (self-loops once), and
/// [`MutualReachabilityGraph::nnz`] counts both orientations. Iterate
/// [`CooGraph::undirected_edges`] for the view in which every
/// `(min(i, j), max(i, j))` pair occurs exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct MutualReachabilityGraph {
    indptr: Vec<usize>,
    core_distances: Vec<f32>,
    graph: CooGraph,
}

impl MutualReachabilityGraph {
    pub(crate) fn new(indptr: Vec<usize>, core_distances: Vec<f32>, graph: CooGraph) -> Self {
        debug_assert_eq!(indptr.len(), graph.n_rows() + 1);
        debug_assert_eq!(core_distances.len(), graph.n_rows());
        Self {
            indptr,
            core_distances,
            graph,
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(vec![0], Vec::new(), CooGraph::empty(0))
    }

    /// Returns the CSR row offsets (`n_points + 1` entries).
    #[must_use]
    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    /// Returns the core distance of every point.
    #[must_use]
    pub fn core_distances(&self) -> &[f32] {
        &self.core_distances
    }

    /// Returns the symmetric edge list.
    #[must_use]
    pub fn graph(&self) -> &CooGraph {
        &self.graph
    }

    /// Returns the number of points.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.core_distances.len()
    }

    /// Returns the number of stored directed edges.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.graph.nnz()
    }

    /// Returns the neighbours and weights of point `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<(&[PointIndex], &[f32])> {
        let start = *self.indptr.get(row)?;
        let end = *self.indptr.get(row + 1)?;
        Some((
            self.graph.cols().get(start..end)?,
            self.graph.vals().get(start..end)?,
        ))
    }

    /// Splits the graph into `(indptr, core_distances, graph)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<usize>, Vec<f32>, CooGraph) {
        (self.indptr, self.core_distances, self.graph)
    }
}

/// Turns narrowed neighbour rows into a [`MutualReachabilityGraph`].
///
/// Runs core-distance extraction, the mutual-reachability rewrite,
/// symmetrization, CSR offset construction, and self-loop saturation.
///
/// # Errors
/// Propagates failures from each stage.
#[instrument(
    name = "core.assemble",
    err,
    skip(knn, symmetrizer, csr),
    fields(points = knn.rows(), k = knn.k()),
)]
pub fn assemble_graph<Y, C>(
    knn: KnnResult,
    min_samples: usize,
    alpha: f32,
    symmetrizer: &Y,
    csr: &C,
) -> Result<MutualReachabilityGraph>
where
    Y: Symmetrize + ?Sized,
    C: CsrConversion + ?Sized,
{
    let m = knn.rows();
    let k = knn.k();
    let (indices, mut distances) = knn.into_parts();
    let core = core_distances(&distances, min_samples, k, m)?;
    transform(&indices, &mut distances, &core, m, k, alpha.recip())?;
    let directed = knn_to_coo(indices, distances, m, k)?;
    let mut graph = symmetrizer.symmetrize(directed)?;
    let indptr = csr.indptr(&graph)?;
    saturate_self_loops(&mut graph);
    Ok(MutualReachabilityGraph::new(indptr, core, graph))
}

/// Builds the mutual-reachability graph of `m` points of dimension `n`.
///
/// `points` is row-major `m × n`. The neighbourhood size equals
/// `min_samples`, and the search runs on a single host device. Use
/// [`ReachGraphBuilder`] for a larger neighbourhood or multi-device search.
///
/// # Errors
/// - Configuration errors from [`ReachGraphBuilder::build`], raised before
///   the points are inspected.
/// - [`crate::ReachGraphError::Points`] for malformed point buffers.
/// - [`crate::ReachGraphError::InsufficientPoints`] when `0 < m < min_samples`.
///
/// # Examples
/// ```
/// use reachgraph_core::{DistanceMetric, mutual_reachability_graph};
///
/// let square = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
/// let graph = mutual_reachability_graph(&square, 4, 2, DistanceMetric::L2SqrtExpanded, 2, 1.0)?;
/// assert_eq!(graph.core_distances(), &[1.0; 4]);
/// assert_eq!(graph.indptr().last(), Some(&graph.nnz()));
/// # Ok::<(), reachgraph_core::ReachGraphError>(())
/// ```
pub fn mutual_reachability_graph(
    points: &[f32],
    m: usize,
    n: usize,
    metric: DistanceMetric,
    min_samples: usize,
    alpha: f32,
) -> Result<MutualReachabilityGraph> {
    let reach = ReachGraphBuilder::new()
        .with_metric(metric)
        .with_min_samples(min_samples)
        .with_alpha(alpha)
        .build()?;
    let points = PointSet::new(points, m, n)?;
    reach.run(points)
}
