//! Shared test utilities for `reachgraph-core`.

use proptest::{prelude::*, test_runner::Config as ProptestConfig};
use reachgraph_test_support::ci::property_test_profile::ProptestRunProfile;

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `PROGTEST_CASES` and
/// `REACHGRAPH_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Row-major point matrix generated for property tests.
#[derive(Clone, Debug)]
pub(crate) struct PointFixture {
    pub(crate) values: Vec<f32>,
    pub(crate) rows: usize,
    pub(crate) dimension: usize,
}

/// Generates small matrices on an integer lattice.
///
/// Lattice coordinates make exact distance ties likely, which exercises the
/// id tie-break.
pub(crate) fn lattice_points(
    rows: core::ops::RangeInclusive<usize>,
    dimension: core::ops::RangeInclusive<usize>,
) -> impl Strategy<Value = PointFixture> {
    (rows, dimension).prop_flat_map(|(rows, dimension)| {
        prop::collection::vec(-8_i8..=8, rows * dimension).prop_map(move |raw| PointFixture {
            values: raw.into_iter().map(f32::from).collect(),
            rows,
            dimension,
        })
    })
}

/// Direct Euclidean distance, used as an oracle.
pub(crate) fn direct_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let delta = f64::from(x) - f64::from(y);
            delta * delta
        })
        .sum::<f64>()
        .sqrt() as f32
}
