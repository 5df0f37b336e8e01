//! Coordinate-format sparse graphs.

use rayon::prelude::*;

use crate::{
    error::{ReachGraphError, Result},
    knn::{MAX_POINTS, PointIndex},
};

/// Weighted directed edge of a [`CooGraph`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    /// Source point.
    pub row: PointIndex,
    /// Target point.
    pub col: PointIndex,
    /// Edge weight.
    pub weight: f32,
}

impl Edge {
    /// Returns whether the edge connects a point to itself.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.row == self.col
    }
}

/// Sparse graph stored as parallel `rows`, `cols`, and `vals` arrays.
///
/// Every row and column id is below [`CooGraph::n_rows`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CooGraph {
    n_rows: usize,
    rows: Vec<PointIndex>,
    cols: Vec<PointIndex>,
    vals: Vec<f32>,
}

impl CooGraph {
    /// Creates a graph with `n_rows` points and no edges.
    #[must_use]
    pub fn empty(n_rows: usize) -> Self {
        Self {
            n_rows,
            ..Self::default()
        }
    }

    /// Assembles a graph from parallel arrays.
    ///
    /// # Errors
    /// - [`ReachGraphError::ShapeMismatch`] when the arrays differ in length.
    /// - [`ReachGraphError::IndexOutOfRange`] when an id is `>= n_rows`.
    ///
    /// # Examples
    /// ```
    /// use reachgraph_core::CooGraph;
    ///
    /// let graph = CooGraph::from_parts(2, vec![0, 1], vec![1, 0], vec![0.5, 0.5])?;
    /// assert_eq!(graph.nnz(), 2);
    /// assert!(CooGraph::from_parts(2, vec![0], vec![2], vec![1.0]).is_err());
    /// # Ok::<(), reachgraph_core::ReachGraphError>(())
    /// ```
    pub fn from_parts(
        n_rows: usize,
        rows: Vec<PointIndex>,
        cols: Vec<PointIndex>,
        vals: Vec<f32>,
    ) -> Result<Self> {
        for (buffer, len) in [("coo_cols", cols.len()), ("coo_vals", vals.len())] {
            if len != rows.len() {
                return Err(ReachGraphError::ShapeMismatch {
                    buffer,
                    expected: rows.len(),
                    actual: len,
                });
            }
        }
        if let Some(&index) = rows
            .iter()
            .chain(&cols)
            .find(|&&index| index as usize >= n_rows)
        {
            return Err(out_of_range(index, n_rows));
        }
        Ok(Self {
            n_rows,
            rows,
            cols,
            vals,
        })
    }

    /// Returns the number of points (rows) in the graph.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the number of stored directed edges.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    /// Returns whether the graph stores no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Returns the edge sources.
    #[must_use]
    pub fn rows(&self) -> &[PointIndex] {
        &self.rows
    }

    /// Returns the edge targets.
    #[must_use]
    pub fn cols(&self) -> &[PointIndex] {
        &self.cols
    }

    /// Returns the edge weights.
    #[must_use]
    pub fn vals(&self) -> &[f32] {
        &self.vals
    }

    /// Returns the edge at `position` in storage order.
    #[must_use]
    pub fn edge(&self, position: usize) -> Option<Edge> {
        Some(Edge {
            row: *self.rows.get(position)?,
            col: *self.cols.get(position)?,
            weight: *self.vals.get(position)?,
        })
    }

    /// Iterates over the stored directed edges in storage order.
    pub fn edges(&self) -> impl ExactSizeIterator<Item = Edge> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.vals)
            .map(|((&row, &col), &weight)| Edge { row, col, weight })
    }

    /// Iterates over each undirected edge once.
    ///
    /// Only meaningful for symmetric graphs: the orientation with
    /// `row <= col` is yielded and its mirror skipped.
    pub fn undirected_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges().filter(|edge| edge.row <= edge.col)
    }

    /// Returns the number of stored self-loops.
    #[must_use]
    pub fn self_loop_count(&self) -> usize {
        self.rows
            .par_iter()
            .zip(self.cols.par_iter())
            .filter(|(row, col)| row == col)
            .count()
    }

    /// Returns whether entries are sorted by `(row, col)`.
    #[must_use]
    pub fn is_row_sorted(&self) -> bool {
        (1..self.rows.len()).all(|position| {
            (self.rows[position - 1], self.cols[position - 1])
                <= (self.rows[position], self.cols[position])
        })
    }

    /// Splits the graph into `(rows, cols, vals)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<PointIndex>, Vec<PointIndex>, Vec<f32>) {
        (self.rows, self.cols, self.vals)
    }

    pub(crate) fn from_trusted(
        n_rows: usize,
        rows: Vec<PointIndex>,
        cols: Vec<PointIndex>,
        vals: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(rows.len(), cols.len());
        debug_assert_eq!(rows.len(), vals.len());
        Self {
            n_rows,
            rows,
            cols,
            vals,
        }
    }
}

fn out_of_range(index: PointIndex, n_rows: usize) -> ReachGraphError {
    ReachGraphError::IndexOutOfRange {
        index: i64::from(index),
        max: n_rows.saturating_sub(1).min(MAX_POINTS),
    }
}

/// Converts a row-major KNN result into a directed COO graph.
///
/// Edge `e` runs from point `e / n_neighbors` to `indices[e]` with weight
/// `distances[e]`. The buffers are moved into the graph without copying.
///
/// # Errors
/// - [`ReachGraphError::ShapeMismatch`] when a buffer does not hold
///   `n_rows × n_neighbors` values.
/// - [`ReachGraphError::TooManyPoints`] when `n_rows` exceeds [`MAX_POINTS`].
/// - [`ReachGraphError::IndexOutOfRange`] when a neighbour id is `>= n_rows`.
///
/// # Examples
/// ```
/// use reachgraph_core::knn_to_coo;
///
/// let graph = knn_to_coo(vec![0, 1, 1, 0], vec![0.0, 2.0, 0.0, 2.0], 2, 2)?;
/// assert_eq!(graph.rows(), &[0, 0, 1, 1]);
/// assert_eq!(graph.cols(), &[0, 1, 1, 0]);
/// # Ok::<(), reachgraph_core::ReachGraphError>(())
/// ```
pub fn knn_to_coo(
    indices: Vec<PointIndex>,
    distances: Vec<f32>,
    n_rows: usize,
    n_neighbors: usize,
) -> Result<CooGraph> {
    let expected = n_rows.saturating_mul(n_neighbors);
    for (buffer, len) in [("knn_indices", indices.len()), ("knn_distances", distances.len())] {
        if len != expected {
            return Err(ReachGraphError::ShapeMismatch {
                buffer,
                expected,
                actual: len,
            });
        }
    }
    if n_rows > MAX_POINTS {
        return Err(ReachGraphError::TooManyPoints {
            points: n_rows,
            max: MAX_POINTS,
        });
    }
    if let Some(&index) = indices.par_iter().find_first(|&&index| index as usize >= n_rows) {
        return Err(out_of_range(index, n_rows));
    }
    let rows: Vec<PointIndex> = (0..indices.len())
        .into_par_iter()
        .map(|edge| (edge / n_neighbors) as PointIndex)
        .collect();
    Ok(CooGraph::from_trusted(n_rows, rows, indices, distances))
}

/// Sets the weight of every self-loop to `f32::MAX` and returns their count.
///
/// The loop stays in the graph as its heaviest edge.
pub fn saturate_self_loops(graph: &mut CooGraph) -> usize {
    let CooGraph {
        rows, cols, vals, ..
    } = graph;
    vals.par_iter_mut()
        .zip(rows.par_iter().zip(cols.par_iter()))
        .filter(|(_, (row, col))| row == col)
        .map(|(weight, _)| *weight = f32::MAX)
        .count()
}
