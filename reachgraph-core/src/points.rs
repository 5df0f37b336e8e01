//! Borrowed views over caller-owned point matrices.

use core::ops::Range;

use rayon::prelude::*;

use crate::error::PointSetError;

/// Read-only view over a dense row-major matrix of `rows × dimension` points.
///
/// The view never copies or mutates the caller's buffer. Construction checks
/// the shape and rejects non-finite coordinates so distance kernels can rely
/// on finite inputs.
///
/// # Examples
/// ```
/// use reachgraph_core::PointSet;
///
/// let values = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
/// let points = PointSet::new(&values, 3, 2)?;
/// assert_eq!(points.rows(), 3);
/// assert_eq!(points.row(1), Some(&[1.0, 0.0][..]));
/// # Ok::<(), reachgraph_core::PointSetError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointSet<'a> {
    values: &'a [f32],
    rows: usize,
    dimension: usize,
}

impl<'a> PointSet<'a> {
    /// Validates and wraps a row-major buffer.
    ///
    /// An empty point set (`rows == 0`) is valid for any dimension.
    ///
    /// # Errors
    /// - [`PointSetError::ShapeMismatch`] when `values.len() != rows * dimension`.
    /// - [`PointSetError::ZeroDimension`] when `rows > 0` and `dimension == 0`.
    /// - [`PointSetError::NonFinite`] when a coordinate is NaN or infinite.
    pub fn new(values: &'a [f32], rows: usize, dimension: usize) -> Result<Self, PointSetError> {
        let expected = rows
            .checked_mul(dimension)
            .ok_or(PointSetError::ShapeMismatch {
                rows,
                dimension,
                expected: usize::MAX,
                actual: values.len(),
            })?;
        if values.len() != expected {
            return Err(PointSetError::ShapeMismatch {
                rows,
                dimension,
                expected,
                actual: values.len(),
            });
        }
        if rows > 0 && dimension == 0 {
            return Err(PointSetError::ZeroDimension);
        }
        if let Some(position) = values.par_iter().position_first(|value| !value.is_finite()) {
            return Err(PointSetError::NonFinite {
                row: position / dimension,
                feature: position % dimension,
                value: values[position],
            });
        }
        Ok(Self {
            values,
            rows,
            dimension,
        })
    }

    /// Wraps a buffer that was produced from an already validated view.
    pub(crate) fn from_validated(values: &'a [f32], rows: usize, dimension: usize) -> Self {
        debug_assert_eq!(values.len(), rows * dimension);
        Self {
            values,
            rows,
            dimension,
        }
    }

    /// Returns the number of points.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of features per point.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns whether the set contains no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Returns the underlying row-major buffer.
    #[must_use]
    pub fn values(&self) -> &'a [f32] {
        self.values
    }

    /// Returns the coordinates of point `index`, if present.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&'a [f32]> {
        let start = index.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        if index >= self.rows {
            return None;
        }
        self.values.get(start..end)
    }

    /// Returns a view over the contiguous rows in `range`.
    #[must_use]
    pub fn slice_rows(&self, range: Range<usize>) -> Option<Self> {
        if range.start > range.end || range.end > self.rows {
            return None;
        }
        let start = range.start * self.dimension;
        let end = range.end * self.dimension;
        Some(Self {
            values: self.values.get(start..end)?,
            rows: range.end - range.start,
            dimension: self.dimension,
        })
    }

    /// Iterates over the rows in order.
    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &'a [f32]> + 'a {
        let dimension = self.dimension.max(1);
        let values = if self.rows == 0 { &[][..] } else { self.values };
        values.chunks_exact(dimension)
    }

    /// Computes the squared L2 norm of every row in parallel.
    pub(crate) fn squared_norms(&self) -> Vec<f64> {
        if self.rows == 0 {
            return Vec::new();
        }
        self.values
            .par_chunks_exact(self.dimension)
            .map(squared_norm)
            .collect()
    }
}

/// Squared L2 norm accumulated in `f64`.
pub(crate) fn squared_norm(row: &[f32]) -> f64 {
    row.iter().map(|&value| f64::from(value) * f64::from(value)).sum()
}
