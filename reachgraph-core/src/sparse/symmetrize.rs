//! Graph symmetrization.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{error::Result, knn::PointIndex};

use super::CooGraph;

/// Turns a directed graph into a symmetric one.
pub trait Symmetrize {
    /// Returns a graph in which `(r, c)` is present exactly when `(c, r)` is,
    /// with identical weights, and no directed pair repeats.
    ///
    /// # Errors
    /// Implementations report failures through [`crate::ReachGraphError`].
    fn symmetrize(&self, graph: CooGraph) -> Result<CooGraph>;
}

/// Symmetrizer that keeps the larger weight of `(i, j)` and `(j, i)`.
///
/// Every directed edge is folded into its undirected key, duplicates collapse
/// with `max`, and both orientations are emitted. Output entries are sorted by
/// `(row, col)`, which is the order the CSR builder expects. Self-loops are
/// kept once.
///
/// # Examples
/// ```
/// use reachgraph_core::{CooGraph, MaxSymmetrizer, Symmetrize};
///
/// let directed = CooGraph::from_parts(2, vec![0, 1], vec![1, 0], vec![1.0, 3.0])?;
/// let symmetric = MaxSymmetrizer.symmetrize(directed)?;
/// assert_eq!(symmetric.vals(), &[3.0, 3.0]);
/// # Ok::<(), reachgraph_core::ReachGraphError>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxSymmetrizer;

impl Symmetrize for MaxSymmetrizer {
    #[instrument(name = "core.symmetrize", skip(self, graph), fields(input_nnz = graph.nnz()), err)]
    fn symmetrize(&self, graph: CooGraph) -> Result<CooGraph> {
        let n_rows = graph.n_rows();
        let (rows, cols, vals) = graph.into_parts();
        let mut undirected: Vec<(PointIndex, PointIndex, f32)> = rows
            .into_par_iter()
            .zip(cols.into_par_iter())
            .zip(vals.into_par_iter())
            .map(|((row, col), weight)| (row.min(col), row.max(col), weight))
            .collect();
        undirected.par_sort_unstable_by(|left, right| (left.0, left.1).cmp(&(right.0, right.1)));
        undirected.dedup_by(|next, kept| {
            let same = (next.0, next.1) == (kept.0, kept.1);
            if same {
                kept.2 = kept.2.max(next.2);
            }
            same
        });

        let mut directed: Vec<(PointIndex, PointIndex, f32)> = undirected
            .par_iter()
            .flat_map_iter(|&(low, high, weight)| {
                let mirror = (low != high).then_some((high, low, weight));
                core::iter::once((low, high, weight)).chain(mirror)
            })
            .collect();
        directed.par_sort_unstable_by(|left, right| (left.0, left.1).cmp(&(right.0, right.1)));

        let nnz = directed.len();
        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);
        let mut vals = Vec::with_capacity(nnz);
        for (row, col, weight) in directed {
            rows.push(row);
            cols.push(col);
            vals.push(weight);
        }
        debug!(undirected = undirected.len(), nnz, "graph symmetrized");
        Ok(CooGraph::from_trusted(n_rows, rows, cols, vals))
    }
}
