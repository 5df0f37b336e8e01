//! Pre-flight memory estimation for graph construction.
//!
//! Provides a conservative estimate of peak memory consumption so callers can
//! reject oversized inputs before any allocation occurs. The estimate applies
//! a safety multiplier for allocator fragmentation, Rayon thread-local buffers,
//! and transient allocations that are hard to predict statically.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Safety multiplier (1.5×) applied to the raw estimate.
const SAFETY_MULTIPLIER_NUMERATOR: u64 = 3;
const SAFETY_MULTIPLIER_DENOMINATOR: u64 = 2;

/// Size of an `f32` coordinate, distance, or weight.
const F32_BYTES: u64 = 4;

/// Size of a wide neighbour id produced by the search.
const WIDE_INDEX_BYTES: u64 = 8;

/// Size of a narrowed point id.
const POINT_INDEX_BYTES: u64 = 4;

/// Size of a CSR offset on 64-bit platforms.
const USIZE_BYTES: u64 = 8;

/// Size of one `(row, col, weight)` tuple used while symmetrizing.
const EDGE_TUPLE_BYTES: u64 = 12;

/// Copies of the edge list alive at the symmetrization peak: the undirected
/// list (1×), both orientations (2×), and the output arrays (2×).
const SYMMETRIZE_EDGE_COPIES: u64 = 5;

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Returns a conservative estimate of peak memory (in bytes) needed to build
/// the graph of `points` points of dimension `dimension` with `n_neighbors`
/// neighbours per point across `devices` devices.
///
/// The estimate covers:
///
/// - Staged copies of the point matrix on every non-home device.
/// - The merged wide search output (`i64` ids and `f32` distances) and, for
///   multi-device runs, the device-private partial outputs.
/// - Narrowed ids and core distances.
/// - The edge list copies alive while symmetrizing.
/// - CSR row offsets.
///
/// A 1.5× safety multiplier is applied to the raw total.
///
/// # Examples
///
/// ```
/// use reachgraph_core::estimate_peak_bytes;
///
/// let bytes = estimate_peak_bytes(1_000, 16, 5, 1);
/// assert!(bytes > 0, "estimate must be positive for non-empty inputs");
///
/// assert_eq!(estimate_peak_bytes(0, 16, 5, 4), 0, "empty input requires no memory");
/// ```
#[must_use]
pub fn estimate_peak_bytes(
    points: usize,
    dimension: usize,
    n_neighbors: usize,
    devices: usize,
) -> u64 {
    if points == 0 {
        return 0;
    }

    let n = points as u64;
    let d = dimension as u64;
    let k = n_neighbors as u64;
    let remote_devices = (devices.max(1) as u64).saturating_sub(1);
    let slots = n.saturating_mul(k);

    // Reference copies on every device other than home.
    let staged = remote_devices.saturating_mul(n.saturating_mul(d).saturating_mul(F32_BYTES));

    // Merged search output, plus partials that sum to the same size.
    let wide_output = slots.saturating_mul(WIDE_INDEX_BYTES + F32_BYTES);
    let partials = if remote_devices > 0 { wide_output } else { 0 };

    let narrowed = slots.saturating_mul(POINT_INDEX_BYTES);
    let core_distances = n.saturating_mul(F32_BYTES);

    let symmetrize = slots
        .saturating_mul(EDGE_TUPLE_BYTES)
        .saturating_mul(SYMMETRIZE_EDGE_COPIES);

    let indptr = n.saturating_add(1).saturating_mul(USIZE_BYTES);

    let subtotal = staged
        .saturating_add(wide_output)
        .saturating_add(partials)
        .saturating_add(narrowed)
        .saturating_add(core_distances)
        .saturating_add(symmetrize)
        .saturating_add(indptr);

    subtotal
        .saturating_mul(SAFETY_MULTIPLIER_NUMERATOR)
        .saturating_div(SAFETY_MULTIPLIER_DENOMINATOR)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Formats a byte count as a human-readable string using binary units.
///
/// # Examples
///
/// ```
/// use reachgraph_core::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1_073_741_824), "1.0 GiB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    let (scaled, unit) = match bytes {
        b if b >= TIB => (b as f64 / TIB as f64, "TiB"),
        b if b >= GIB => (b as f64 / GIB as f64, "GiB"),
        b if b >= MIB => (b as f64 / MIB as f64, "MiB"),
        b if b >= KIB => (b as f64 / KIB as f64, "KiB"),
        b => return format!("{b} B"),
    };
    format!("{scaled:.1} {unit}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::small(100, 8, 5)]
    #[case::wide(1_000, 512, 16)]
    #[case::large(1_000_000, 32, 10)]
    fn estimate_returns_positive_for_non_empty(
        #[case] points: usize,
        #[case] dimension: usize,
        #[case] n_neighbors: usize,
    ) {
        let bytes = estimate_peak_bytes(points, dimension, n_neighbors, 1);
        assert!(bytes > 0, "expected positive estimate, got {bytes}");
    }

    #[rstest]
    fn estimate_grows_with_neighbourhood() {
        let small = estimate_peak_bytes(1_000, 8, 5, 1);
        let large = estimate_peak_bytes(1_000, 8, 15, 1);
        assert!(large > small, "expected {large} > {small}");
    }

    #[rstest]
    fn staging_only_counts_for_multiple_devices() {
        let single = estimate_peak_bytes(10_000, 64, 5, 1);
        let narrow = estimate_peak_bytes(10_000, 8, 5, 1);
        assert_eq!(single, narrow, "dimension only matters for staged copies");

        let two = estimate_peak_bytes(10_000, 64, 5, 2);
        let four = estimate_peak_bytes(10_000, 64, 5, 4);
        assert!(two > single);
        assert!(four > two);
    }

    #[rstest]
    fn zero_devices_are_treated_as_one() {
        assert_eq!(
            estimate_peak_bytes(500, 3, 4, 0),
            estimate_peak_bytes(500, 3, 4, 1)
        );
    }

    #[rstest]
    fn estimate_zero_points_returns_zero() {
        assert_eq!(estimate_peak_bytes(0, 16, 5, 2), 0);
    }

    #[rstest]
    fn estimate_huge_inputs_saturate() {
        // The subtotal and the safety multiplication both saturate before the
        // final division.
        let bytes = estimate_peak_bytes(usize::MAX, usize::MAX, 24, 8);
        assert_eq!(bytes, u64::MAX / 2);
    }

    #[rstest]
    #[case::bytes(512, "512 B")]
    #[case::kibibytes(1536, "1.5 KiB")]
    #[case::mebibytes(5 * 1024 * 1024, "5.0 MiB")]
    #[case::tebibytes(2 * 1024 * 1024 * 1024 * 1024, "2.0 TiB")]
    fn formats_binary_units(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }
}
