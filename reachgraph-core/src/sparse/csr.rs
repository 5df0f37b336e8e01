//! Compressed sparse row offsets.

use tracing::instrument;

use crate::error::{ReachGraphError, Result};

use super::CooGraph;

/// Derives CSR row offsets for a row-sorted [`CooGraph`].
pub trait CsrConversion {
    /// Returns `indptr` of length `n_rows + 1` such that the entries of row
    /// `r` occupy `indptr[r]..indptr[r + 1]` of the graph's arrays.
    ///
    /// # Errors
    /// Returns [`ReachGraphError::UnsortedRows`] when the graph is not sorted
    /// by row.
    fn indptr(&self, graph: &CooGraph) -> Result<Vec<usize>>;
}

/// Builds `indptr` from per-row degrees with a prefix sum.
///
/// # Examples
/// ```
/// use reachgraph_core::{CooGraph, CsrConversion, PrefixSumCsr};
///
/// let graph = CooGraph::from_parts(3, vec![0, 0, 2], vec![0, 2, 0], vec![1.0; 3])?;
/// assert_eq!(PrefixSumCsr.indptr(&graph)?, vec![0, 2, 2, 3]);
/// # Ok::<(), reachgraph_core::ReachGraphError>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct PrefixSumCsr;

impl CsrConversion for PrefixSumCsr {
    #[instrument(name = "core.csr", skip(self, graph), fields(nnz = graph.nnz()), err)]
    fn indptr(&self, graph: &CooGraph) -> Result<Vec<usize>> {
        let rows = graph.rows();
        if let Some(position) = rows.windows(2).position(|pair| pair[0] > pair[1]) {
            return Err(ReachGraphError::UnsortedRows {
                position: position + 1,
            });
        }
        let mut indptr = vec![0_usize; graph.n_rows() + 1];
        for &row in rows {
            indptr[row as usize + 1] += 1;
        }
        for row in 0..graph.n_rows() {
            indptr[row + 1] += indptr[row];
        }
        Ok(indptr)
    }
}
