//! Distance metric selection.

use core::fmt;

use crate::error::{ReachGraphError, Result};

/// Distance metrics understood by the nearest-neighbour search contract.
///
/// Only [`DistanceMetric::L2SqrtExpanded`] is implemented: the Euclidean
/// distance evaluated through the expanded identity
/// `‖a‖² + ‖b‖² − 2·a·b`. The remaining variants exist so callers can name
/// them and receive a clear [`ReachGraphError::UnsupportedMetric`] before any
/// work starts.
///
/// # Examples
/// ```
/// use reachgraph_core::DistanceMetric;
///
/// assert!(DistanceMetric::L2SqrtExpanded.ensure_supported().is_ok());
/// assert!(DistanceMetric::Cosine.ensure_supported().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum DistanceMetric {
    /// Euclidean distance through the expanded squared-norm identity.
    #[default]
    L2SqrtExpanded,
    /// Squared Euclidean distance through the expanded identity.
    L2Expanded,
    /// Euclidean distance accumulated from coordinate differences.
    L2SqrtUnexpanded,
    /// Squared Euclidean distance accumulated from coordinate differences.
    L2Unexpanded,
    /// Negated inner product.
    InnerProduct,
    /// Cosine distance.
    Cosine,
    /// Manhattan distance.
    L1,
    /// Chebyshev distance.
    Linf,
}

impl DistanceMetric {
    /// The single metric the search pipeline implements.
    pub const SUPPORTED: Self = Self::L2SqrtExpanded;

    /// Returns the stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2SqrtExpanded => "l2_sqrt_expanded",
            Self::L2Expanded => "l2_expanded",
            Self::L2SqrtUnexpanded => "l2_sqrt_unexpanded",
            Self::L2Unexpanded => "l2_unexpanded",
            Self::InnerProduct => "inner_product",
            Self::Cosine => "cosine",
            Self::L1 => "l1",
            Self::Linf => "linf",
        }
    }

    /// Returns whether the pipeline can run with this metric.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::L2SqrtExpanded)
    }

    /// Fails fast when the metric is not implemented.
    ///
    /// # Errors
    /// Returns [`ReachGraphError::UnsupportedMetric`] for every metric other
    /// than [`DistanceMetric::SUPPORTED`].
    pub fn ensure_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(ReachGraphError::UnsupportedMetric { metric: self })
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
