//! Lossless conversion from search ids to graph ids.

use rayon::prelude::*;

use crate::error::{ReachGraphError, Result};

use super::{PointIndex, WideIndex};

/// Largest point count addressable with [`PointIndex`].
pub const MAX_POINTS: usize = PointIndex::MAX as usize;

/// Rejects point counts that cannot be addressed with [`PointIndex`].
///
/// # Errors
/// Returns [`ReachGraphError::TooManyPoints`] when `points > MAX_POINTS`.
pub fn ensure_indexable(points: usize) -> Result<()> {
    if points > MAX_POINTS {
        return Err(ReachGraphError::TooManyPoints {
            points,
            max: MAX_POINTS,
        });
    }
    Ok(())
}

/// Narrows wide search ids to [`PointIndex`], failing instead of truncating.
///
/// # Errors
/// Returns [`ReachGraphError::IndexOutOfRange`] for the first id (in buffer
/// order) that is negative or above [`PointIndex::MAX`].
///
/// # Examples
/// ```
/// use reachgraph_core::narrow_indices;
///
/// assert_eq!(narrow_indices(&[0, 7, 3])?, vec![0, 7, 3]);
/// assert!(narrow_indices(&[-1]).is_err());
/// # Ok::<(), reachgraph_core::ReachGraphError>(())
/// ```
pub fn narrow_indices(wide: &[WideIndex]) -> Result<Vec<PointIndex>> {
    let narrowed: Vec<Option<PointIndex>> = wide
        .par_iter()
        .map(|&index| PointIndex::try_from(index).ok())
        .collect();
    if let Some(position) = narrowed.iter().position(Option::is_none) {
        return Err(ReachGraphError::IndexOutOfRange {
            index: wide[position],
            max: MAX_POINTS,
        });
    }
    Ok(narrowed.into_iter().flatten().collect())
}
