//! Fixtures and invariant checks shared by the integration suites.

use std::collections::HashMap;

use proptest::prelude::*;
use reachgraph_core::MutualReachabilityGraph;
use reachgraph_test_support::ci::property_test_profile::ProptestRunProfile;

/// Corners of the unit square, row-major.
pub const UNIT_SQUARE: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];

/// Five points on a line with growing gaps.
pub const LINE: [f32; 5] = [0.0, 1.0, 3.0, 6.0, 10.0];

/// Row-major point matrix generated for property tests.
#[derive(Clone, Debug)]
pub struct Cloud {
    pub values: Vec<f32>,
    pub rows: usize,
    pub dimension: usize,
}

/// Integer lattice clouds, so duplicates and exact ties occur often.
pub fn lattice_cloud(max_rows: usize, max_dimension: usize) -> impl Strategy<Value = Cloud> {
    (1..=max_rows, 1..=max_dimension).prop_flat_map(|(rows, dimension)| {
        prop::collection::vec(-6_i8..=6, rows * dimension).prop_map(move |raw| Cloud {
            values: raw.into_iter().map(f32::from).collect(),
            rows,
            dimension,
        })
    })
}

#[must_use]
pub fn proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        ..ProptestConfig::default()
    }
}

/// Checks the structural invariants every built graph must satisfy.
///
/// `alpha` is the configured divisor, used to bound non-self weights from
/// below by the larger core distance.
pub fn check_invariants(graph: &MutualReachabilityGraph, alpha: f32) -> Result<(), String> {
    let n = graph.n_points();
    let indptr = graph.indptr();
    let coo = graph.graph();

    if indptr.len() != n + 1 {
        return Err(format!("indptr has {} entries for {n} points", indptr.len()));
    }
    if indptr.first() != Some(&0) || indptr.last() != Some(&graph.nnz()) {
        return Err(format!("indptr {indptr:?} does not span {} edges", graph.nnz()));
    }
    if indptr.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(format!("indptr {indptr:?} is not monotonic"));
    }

    let mut weights = HashMap::with_capacity(coo.nnz());
    let mut previous = None;
    for (position, edge) in coo.edges().enumerate() {
        let key = (edge.row, edge.col);
        if previous.is_some_and(|last| last >= key) {
            return Err(format!("edge {key:?} breaks strict (row, col) order"));
        }
        previous = Some(key);
        weights.insert(key, edge.weight);

        let row = edge.row as usize;
        let col = edge.col as usize;
        if !(indptr[row]..indptr[row + 1]).contains(&position) {
            return Err(format!("edge {key:?} lies outside its CSR row"));
        }
        if edge.is_self_loop() {
            if edge.weight != f32::MAX {
                return Err(format!("self-loop {key:?} weighs {}", edge.weight));
            }
            continue;
        }
        let floor = graph.core_distances()[row].max(graph.core_distances()[col]) / alpha;
        if edge.weight < floor * (1.0 - 1e-6) {
            return Err(format!(
                "edge {key:?} weighs {} below the core floor {floor}",
                edge.weight
            ));
        }
    }

    for (&(row, col), &weight) in &weights {
        match weights.get(&(col, row)) {
            Some(&mirror) if mirror == weight => {}
            other => {
                return Err(format!(
                    "edge ({row}, {col}) weighs {weight} but its mirror is {other:?}"
                ));
            }
        }
    }
    Ok(())
}
