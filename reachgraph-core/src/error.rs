//! Error types for the reachgraph core library.
//!
//! Defines the error enums exposed by the public API, their stable
//! machine-readable codes, and a convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{device::DeviceId, metric::DistanceMetric};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? $( ( $($tuple:tt)* ) )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? $( ( $($tuple)* ) )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced while validating a caller-supplied point matrix.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PointSetError {
    /// The flat buffer does not hold `rows * dimension` values.
    #[error("point buffer holds {actual} values but {rows} rows of dimension {dimension} need {expected}")]
    ShapeMismatch {
        /// Number of rows declared by the caller.
        rows: usize,
        /// Number of features per row declared by the caller.
        dimension: usize,
        /// Number of values implied by the declared shape.
        expected: usize,
        /// Number of values actually supplied.
        actual: usize,
    },
    /// A non-empty point set declared zero features per row.
    #[error("a non-empty point set must have positive dimension")]
    ZeroDimension,
    /// A coordinate was NaN or infinite.
    #[error("point {row} has a non-finite value at feature {feature}: {value}")]
    NonFinite {
        /// Row containing the offending value.
        row: usize,
        /// Feature column containing the offending value.
        feature: usize,
        /// The rejected value.
        value: f32,
    },
}

define_error_codes! {
    /// Stable codes describing [`PointSetError`] variants.
    enum PointSetErrorCode for PointSetError {
        /// The flat buffer does not match the declared shape.
        ShapeMismatch => ShapeMismatch { .. } => "POINT_SET_SHAPE_MISMATCH",
        /// A non-empty point set declared zero features per row.
        ZeroDimension => ZeroDimension => "POINT_SET_ZERO_DIMENSION",
        /// A coordinate was NaN or infinite.
        NonFinite => NonFinite { .. } => "POINT_SET_NON_FINITE",
    }
}

/// An error raised by a device runtime or by a search running on a device.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DeviceError {
    /// The device could not satisfy an allocation.
    #[error("device {device} cannot allocate {requested} bytes ({available} available)")]
    OutOfMemory {
        /// Device that rejected the allocation.
        device: DeviceId,
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes still free on the device.
        available: usize,
    },
    /// The referenced device does not exist.
    #[error("device {device} does not exist ({device_count} devices available)")]
    UnknownDevice {
        /// Device that was requested.
        device: DeviceId,
        /// Number of devices known to the runtime.
        device_count: usize,
    },
    /// A copy between host and device memory had mismatched lengths.
    #[error("copy on device {device} from {from_len} elements into {to_len} elements")]
    TransferLengthMismatch {
        /// Device owning the buffer involved in the copy.
        device: DeviceId,
        /// Number of elements in the copy source.
        from_len: usize,
        /// Number of elements in the copy destination.
        to_len: usize,
    },
    /// The search primitive does not implement the requested metric.
    #[error("device {device} cannot search with metric {metric}")]
    UnsupportedMetric {
        /// Device that received the request.
        device: DeviceId,
        /// The rejected metric.
        metric: DistanceMetric,
    },
    /// Reference and query rows had different dimensionality.
    #[error("reference dimension {reference} differs from query dimension {queries}")]
    DimensionMismatch {
        /// Dimensionality of the reference set.
        reference: usize,
        /// Dimensionality of the query set.
        queries: usize,
    },
    /// More neighbours were requested than the reference set holds.
    #[error("cannot return {k} neighbours from a reference set of {reference_rows} rows")]
    NeighbourhoodTooLarge {
        /// Requested neighbourhood size.
        k: usize,
        /// Rows available in the reference set.
        reference_rows: usize,
    },
    /// Output buffers supplied to a search had the wrong length.
    #[error("search output holds {actual} slots but {expected} are required")]
    OutputLengthMismatch {
        /// Slots required by the request (`queries * k`).
        expected: usize,
        /// Slots supplied by the caller.
        actual: usize,
    },
    /// A computed distance overflowed or was otherwise non-finite.
    #[error("distance between query {query} and reference {reference} is not finite")]
    NonFiniteDistance {
        /// Query row (relative to the searched chunk).
        query: usize,
        /// Reference row.
        reference: usize,
    },
    /// A device-specific failure reported by the search primitive.
    #[error("search on device {device} failed: {reason}")]
    SearchFailed {
        /// Device on which the search failed.
        device: DeviceId,
        /// Description supplied by the search implementation.
        reason: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`DeviceError`] variants.
    enum DeviceErrorCode for DeviceError {
        /// The device could not satisfy an allocation.
        OutOfMemory => OutOfMemory { .. } => "DEVICE_OUT_OF_MEMORY",
        /// The referenced device does not exist.
        UnknownDevice => UnknownDevice { .. } => "DEVICE_UNKNOWN",
        /// A host/device copy had mismatched lengths.
        TransferLengthMismatch => TransferLengthMismatch { .. } => "DEVICE_TRANSFER_LENGTH_MISMATCH",
        /// The search primitive does not implement the requested metric.
        UnsupportedMetric => UnsupportedMetric { .. } => "DEVICE_UNSUPPORTED_METRIC",
        /// Reference and query rows had different dimensionality.
        DimensionMismatch => DimensionMismatch { .. } => "DEVICE_DIMENSION_MISMATCH",
        /// More neighbours were requested than the reference set holds.
        NeighbourhoodTooLarge => NeighbourhoodTooLarge { .. } => "DEVICE_NEIGHBOURHOOD_TOO_LARGE",
        /// Output buffers had the wrong length.
        OutputLengthMismatch => OutputLengthMismatch { .. } => "DEVICE_OUTPUT_LENGTH_MISMATCH",
        /// A computed distance was non-finite.
        NonFiniteDistance => NonFiniteDistance { .. } => "DEVICE_NON_FINITE_DISTANCE",
        /// A device-specific search failure.
        SearchFailed => SearchFailed { .. } => "DEVICE_SEARCH_FAILED",
    }
}

/// Error type produced when configuring or running the graph pipeline.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReachGraphError {
    /// Only Euclidean distance in expanded form is implemented.
    #[error("distance metric {metric} is not supported; use {supported}", supported = DistanceMetric::SUPPORTED)]
    UnsupportedMetric {
        /// The rejected metric.
        metric: DistanceMetric,
    },
    /// `min_samples` must be at least one.
    #[error("min_samples must be at least 1 (got {got})")]
    InvalidMinSamples {
        /// The rejected value.
        got: usize,
    },
    /// The searched neighbourhood is smaller than `min_samples`.
    #[error("min_samples {min_samples} exceeds the searched neighbourhood of {n_neighbors}")]
    MinSamplesExceedsNeighbourhood {
        /// Configured `min_samples`.
        min_samples: usize,
        /// Configured neighbourhood size.
        n_neighbors: usize,
    },
    /// `alpha` must be finite and at least one.
    #[error("alpha must be a finite value >= 1.0 (got {alpha})")]
    InvalidAlpha {
        /// The rejected value.
        alpha: f32,
    },
    /// The point set holds fewer rows than the neighbourhood size.
    #[error("{points} points cannot provide {n_neighbors} distinct neighbours")]
    InsufficientPoints {
        /// Number of points supplied.
        points: usize,
        /// Neighbourhood size requested.
        n_neighbors: usize,
    },
    /// The point count cannot be addressed by the working index type.
    #[error("{points} points exceed the addressable maximum of {max}")]
    TooManyPoints {
        /// Number of points supplied.
        points: usize,
        /// Largest supported point count.
        max: usize,
    },
    /// A neighbour index could not be represented in the working index type.
    #[error("neighbour index {index} is outside the supported range 0..={max}")]
    IndexOutOfRange {
        /// The offending index.
        index: i64,
        /// Largest supported index.
        max: usize,
    },
    /// An intermediate buffer had an unexpected length.
    #[error("{buffer} holds {actual} values but {expected} were expected")]
    ShapeMismatch {
        /// Name of the buffer that failed validation.
        buffer: &'static str,
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        actual: usize,
    },
    /// A graph handed to the CSR builder was not sorted by row.
    #[error("graph rows are not sorted at entry {position}")]
    UnsortedRows {
        /// First entry whose row is smaller than its predecessor's.
        position: usize,
    },
    /// The caller-supplied point matrix was invalid.
    #[error(transparent)]
    Points(#[from] PointSetError),
    /// The device runtime reported no usable device.
    #[error("no compute devices are available")]
    NoDevices,
    /// Allocating device memory failed while staging a call.
    #[error("allocation on device {device} failed: {error}")]
    DeviceAllocation {
        /// Device on which the allocation failed.
        device: DeviceId,
        #[source]
        /// Underlying device error.
        error: DeviceError,
    },
    /// Copying between host and device memory failed.
    #[error("transfer on device {device} failed: {error}")]
    DeviceTransfer {
        /// Device involved in the copy.
        device: DeviceId,
        #[source]
        /// Underlying device error.
        error: DeviceError,
    },
    /// A nearest-neighbour sub-search failed.
    #[error("neighbour search on device {device} failed: {error}")]
    DeviceSearch {
        /// Device on which the search ran.
        device: DeviceId,
        #[source]
        /// Underlying device error.
        error: DeviceError,
    },
    /// Discovering devices or changing the device binding failed.
    #[error("device context failure: {error}")]
    DeviceContext {
        #[source]
        /// Underlying device error.
        error: DeviceError,
    },
    /// The per-device worker pool could not be created.
    #[error("failed to start device worker pool: {message}")]
    DevicePool {
        /// Description of the pool construction failure.
        message: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`ReachGraphError`] variants.
    enum ReachGraphErrorCode for ReachGraphError {
        /// Only Euclidean distance in expanded form is implemented.
        UnsupportedMetric => UnsupportedMetric { .. } => "REACHGRAPH_UNSUPPORTED_METRIC",
        /// `min_samples` must be at least one.
        InvalidMinSamples => InvalidMinSamples { .. } => "REACHGRAPH_INVALID_MIN_SAMPLES",
        /// The searched neighbourhood is smaller than `min_samples`.
        MinSamplesExceedsNeighbourhood => MinSamplesExceedsNeighbourhood { .. } => "REACHGRAPH_MIN_SAMPLES_EXCEEDS_NEIGHBOURHOOD",
        /// `alpha` must be finite and at least one.
        InvalidAlpha => InvalidAlpha { .. } => "REACHGRAPH_INVALID_ALPHA",
        /// The point set holds fewer rows than the neighbourhood size.
        InsufficientPoints => InsufficientPoints { .. } => "REACHGRAPH_INSUFFICIENT_POINTS",
        /// The point count cannot be addressed by the working index type.
        TooManyPoints => TooManyPoints { .. } => "REACHGRAPH_TOO_MANY_POINTS",
        /// A neighbour index could not be narrowed.
        IndexOutOfRange => IndexOutOfRange { .. } => "REACHGRAPH_INDEX_OUT_OF_RANGE",
        /// An intermediate buffer had an unexpected length.
        ShapeMismatch => ShapeMismatch { .. } => "REACHGRAPH_SHAPE_MISMATCH",
        /// A graph handed to the CSR builder was not sorted by row.
        UnsortedRows => UnsortedRows { .. } => "REACHGRAPH_UNSORTED_ROWS",
        /// The caller-supplied point matrix was invalid.
        InvalidPoints => Points(..) => "REACHGRAPH_INVALID_POINTS",
        /// The device runtime reported no usable device.
        NoDevices => NoDevices => "REACHGRAPH_NO_DEVICES",
        /// Allocating device memory failed.
        DeviceAllocation => DeviceAllocation { .. } => "REACHGRAPH_DEVICE_ALLOCATION",
        /// Copying between host and device memory failed.
        DeviceTransfer => DeviceTransfer { .. } => "REACHGRAPH_DEVICE_TRANSFER",
        /// A nearest-neighbour sub-search failed.
        DeviceSearch => DeviceSearch { .. } => "REACHGRAPH_DEVICE_SEARCH",
        /// Discovering devices or changing the binding failed.
        DeviceContext => DeviceContext { .. } => "REACHGRAPH_DEVICE_CONTEXT",
        /// The per-device worker pool could not be created.
        DevicePool => DevicePool { .. } => "REACHGRAPH_DEVICE_POOL",
    }
}

impl ReachGraphError {
    /// Retrieve the inner [`DeviceErrorCode`] when the error originated on a device.
    #[must_use]
    pub const fn device_code(&self) -> Option<DeviceErrorCode> {
        match self {
            Self::DeviceAllocation { error, .. }
            | Self::DeviceTransfer { error, .. }
            | Self::DeviceSearch { error, .. }
            | Self::DeviceContext { error } => Some(error.code()),
            _ => None,
        }
    }

    /// Returns `true` for errors raised while validating configuration,
    /// before any device work was attempted.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMetric { .. }
                | Self::InvalidMinSamples { .. }
                | Self::MinSamplesExceedsNeighbourhood { .. }
                | Self::InvalidAlpha { .. }
                | Self::InsufficientPoints { .. }
                | Self::TooManyPoints { .. }
                | Self::Points(..)
        )
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, ReachGraphError>;
