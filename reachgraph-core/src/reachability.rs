//! Mutual-reachability rewrite of neighbour distances.

use rayon::prelude::*;
use tracing::instrument;

use crate::{
    error::{ReachGraphError, Result},
    knn::{MAX_POINTS, PointIndex},
};

/// Mutual-reachability distance between two points.
///
/// # Examples
/// ```
/// use reachgraph_core::mutual_reachability;
///
/// assert_eq!(mutual_reachability(1.0, 3.0, 2.0, 1.0), 3.0);
/// assert_eq!(mutual_reachability(1.0, 0.5, 4.0, 0.5), 2.0);
/// ```
#[must_use]
pub fn mutual_reachability(core_a: f32, core_b: f32, distance: f32, inverse_alpha: f32) -> f32 {
    core_a.max(core_b).max(distance) * inverse_alpha
}

/// Rewrites `distances` in place as mutual-reachability distances.
///
/// For row `i` and slot `j`,
/// `distances[i][j] = max(core[i], core[indices[i][j]], distances[i][j]) * inverse_alpha`.
/// Rows are processed in parallel and no ordering is preserved within a row.
///
/// # Errors
/// - [`ReachGraphError::ShapeMismatch`] when a buffer does not match
///   `m × n_neighbors` (or `m` for the core distances).
/// - [`ReachGraphError::IndexOutOfRange`] when a neighbour id is `>= m`.
///   Rows processed before the offending row may already be rewritten.
#[instrument(
    name = "core.reachability",
    err,
    skip(indices, distances, core_distances),
    fields(edges = distances.len()),
)]
pub fn transform(
    indices: &[PointIndex],
    distances: &mut [f32],
    core_distances: &[f32],
    m: usize,
    n_neighbors: usize,
    inverse_alpha: f32,
) -> Result<()> {
    let expected = m.saturating_mul(n_neighbors);
    check_len("knn_indices", expected, indices.len())?;
    check_len("knn_distances", expected, distances.len())?;
    check_len("core_distances", m, core_distances.len())?;
    if expected == 0 {
        return Ok(());
    }
    distances
        .par_chunks_mut(n_neighbors)
        .zip(indices.par_chunks(n_neighbors))
        .zip(core_distances.par_iter())
        .try_for_each(|((row_distances, row_indices), &core_row)| {
            for (distance, &neighbour) in row_distances.iter_mut().zip(row_indices) {
                let core_neighbour = core_distances
                    .get(neighbour as usize)
                    .copied()
                    .ok_or(ReachGraphError::IndexOutOfRange {
                        index: i64::from(neighbour),
                        max: m.saturating_sub(1).min(MAX_POINTS),
                    })?;
                *distance = mutual_reachability(core_row, core_neighbour, *distance, inverse_alpha);
            }
            Ok(())
        })
}

fn check_len(buffer: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ReachGraphError::ShapeMismatch {
            buffer,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn rewrites_each_slot_with_both_core_distances() {
        let indices = [0, 1, 1, 2, 2, 0];
        let mut distances = [0.0, 1.0, 0.0, 1.5, 0.0, 2.0];
        let core = [1.0, 0.5, 3.0];
        transform(&indices, &mut distances, &core, 3, 2, 1.0).expect("valid input");
        assert_eq!(distances, [1.0, 1.0, 0.5, 3.0, 3.0, 3.0]);
    }

    #[rstest]
    #[case::identity(1.0, [2.0, 4.0])]
    #[case::half(0.5, [1.0, 2.0])]
    fn scales_by_inverse_alpha(#[case] inverse_alpha: f32, #[case] expected: [f32; 2]) {
        let indices = [0, 1, 1, 0];
        let mut distances = [0.0, 4.0, 0.0, 4.0];
        transform(&indices, &mut distances, &[2.0, 1.0], 2, 2, inverse_alpha).expect("valid");
        assert_eq!([distances[0], distances[1]], expected);
    }

    #[rstest]
    fn rejects_out_of_range_neighbour() {
        let indices = [0, 7];
        let mut distances = [0.0, 1.0];
        let err = transform(&indices, &mut distances, &[0.0], 1, 2, 1.0)
            .expect_err("neighbour 7 does not exist");
        assert_eq!(err, ReachGraphError::IndexOutOfRange { index: 7, max: 0 });
    }

    #[rstest]
    #[case::indices(3, 4, 2, "knn_indices")]
    #[case::distances(4, 3, 2, "knn_distances")]
    #[case::core(4, 4, 1, "core_distances")]
    fn rejects_mismatched_buffers(
        #[case] index_len: usize,
        #[case] distance_len: usize,
        #[case] core_len: usize,
        #[case] buffer: &'static str,
    ) {
        let indices = vec![0; index_len];
        let mut distances = vec![0.0; distance_len];
        let core = vec![0.0; core_len];
        let err = transform(&indices, &mut distances, &core, 2, 2, 1.0)
            .expect_err("shape must be rejected");
        assert!(matches!(
            err,
            ReachGraphError::ShapeMismatch { buffer: got, .. } if got == buffer
        ));
    }

    #[rstest]
    fn empty_input_is_a_no_op() {
        transform(&[], &mut [], &[], 0, 3, 1.0).expect("empty input is valid");
    }
}
