use std::collections::HashMap;

use proptest::prelude::*;
use rstest::rstest;

use crate::{error::ReachGraphError, test_utils::suite_proptest_config};

use super::{
    CooGraph, CsrConversion, MaxSymmetrizer, PrefixSumCsr, Symmetrize, knn_to_coo,
    saturate_self_loops,
};

#[rstest]
fn knn_rows_follow_neighbourhood_size() {
    let graph = knn_to_coo(
        vec![0, 2, 1, 0, 2, 1],
        vec![0.0, 1.0, 0.0, 2.0, 0.0, 3.0],
        3,
        2,
    )
    .expect("valid input");
    assert_eq!(graph.rows(), &[0, 0, 1, 1, 2, 2]);
    assert_eq!(graph.cols(), &[0, 2, 1, 0, 2, 1]);
    assert_eq!(graph.n_rows(), 3);
}

#[rstest]
fn knn_to_coo_rejects_bad_shapes() {
    assert!(matches!(
        knn_to_coo(vec![0; 5], vec![0.0; 6], 3, 2),
        Err(ReachGraphError::ShapeMismatch {
            buffer: "knn_indices",
            expected: 6,
            actual: 5,
        })
    ));
    assert!(matches!(
        knn_to_coo(vec![0, 3], vec![0.0, 1.0], 1, 2),
        Err(ReachGraphError::IndexOutOfRange { index: 3, .. })
    ));
}

#[rstest]
fn symmetrizer_keeps_larger_weight_for_reciprocal_pairs() {
    let directed = CooGraph::from_parts(
        3,
        vec![0, 1, 1, 2, 0],
        vec![1, 0, 2, 1, 0],
        vec![1.0, 4.0, 2.0, 1.5, 0.0],
    )
    .expect("valid graph");
    let symmetric = MaxSymmetrizer.symmetrize(directed).expect("symmetrize");
    assert_eq!(symmetric.rows(), &[0, 0, 1, 1, 2]);
    assert_eq!(symmetric.cols(), &[0, 1, 0, 2, 1]);
    assert_eq!(symmetric.vals(), &[0.0, 4.0, 4.0, 2.0, 2.0]);
    assert!(symmetric.is_row_sorted());
}

#[rstest]
fn symmetrizer_mirrors_one_sided_edges() {
    let directed = CooGraph::from_parts(3, vec![2], vec![0], vec![5.0]).expect("valid graph");
    let symmetric = MaxSymmetrizer.symmetrize(directed).expect("symmetrize");
    assert_eq!(symmetric.rows(), &[0, 2]);
    assert_eq!(symmetric.cols(), &[2, 0]);
    assert_eq!(symmetric.vals(), &[5.0, 5.0]);
    let undirected: Vec<_> = symmetric.undirected_edges().collect();
    assert_eq!(undirected.len(), 1);
    assert_eq!((undirected[0].row, undirected[0].col), (0, 2));
}

#[rstest]
fn symmetrizer_collapses_duplicate_self_loops() {
    let directed =
        CooGraph::from_parts(1, vec![0, 0], vec![0, 0], vec![0.0, 1.0]).expect("valid graph");
    let symmetric = MaxSymmetrizer.symmetrize(directed).expect("symmetrize");
    assert_eq!(symmetric.nnz(), 1);
    assert_eq!(symmetric.self_loop_count(), 1);
}

#[rstest]
fn self_loops_saturate_to_max() {
    let mut graph =
        CooGraph::from_parts(2, vec![0, 0, 1], vec![0, 1, 1], vec![0.0, 2.0, 0.5]).expect("valid");
    assert_eq!(saturate_self_loops(&mut graph), 2);
    assert_eq!(graph.vals(), &[f32::MAX, 2.0, f32::MAX]);
}

#[rstest]
#[case::empty(CooGraph::empty(0), vec![0])]
#[case::isolated(CooGraph::empty(3), vec![0, 0, 0, 0])]
fn indptr_for_edgeless_graphs(#[case] graph: CooGraph, #[case] expected: Vec<usize>) {
    assert_eq!(PrefixSumCsr.indptr(&graph).expect("sorted"), expected);
}

#[rstest]
fn indptr_rejects_unsorted_rows() {
    let graph = CooGraph::from_parts(2, vec![1, 0], vec![0, 1], vec![1.0, 1.0]).expect("valid");
    assert_eq!(
        PrefixSumCsr.indptr(&graph),
        Err(ReachGraphError::UnsortedRows { position: 1 })
    );
}

#[rstest]
fn from_parts_checks_lengths() {
    assert!(matches!(
        CooGraph::from_parts(2, vec![0, 1], vec![1], vec![1.0, 1.0]),
        Err(ReachGraphError::ShapeMismatch {
            buffer: "coo_cols",
            ..
        })
    ));
}

fn directed_graph() -> impl Strategy<Value = CooGraph> {
    (1_usize..=20).prop_flat_map(|n_rows| {
        let id = 0..n_rows as u32;
        prop::collection::vec((id.clone(), id, 0.0_f32..50.0), 0..=80).prop_map(move |edges| {
            let (rows, cols, vals) = edges.into_iter().fold(
                (Vec::new(), Vec::new(), Vec::new()),
                |(mut rows, mut cols, mut vals), (row, col, weight)| {
                    rows.push(row);
                    cols.push(col);
                    vals.push(weight);
                    (rows, cols, vals)
                },
            );
            CooGraph::from_parts(n_rows, rows, cols, vals).expect("ids are in range")
        })
    })
}

proptest! {
    #![proptest_config(suite_proptest_config(128))]

    #[test]
    fn symmetrized_graph_is_symmetric_with_max_weights(graph in directed_graph()) {
        let mut expected: HashMap<(u32, u32), f32> = HashMap::new();
        for edge in graph.edges() {
            let key = (edge.row.min(edge.col), edge.row.max(edge.col));
            let slot = expected.entry(key).or_insert(edge.weight);
            *slot = slot.max(edge.weight);
        }

        let symmetric = MaxSymmetrizer.symmetrize(graph).expect("symmetrize");
        prop_assert!(symmetric.is_row_sorted());

        let mut seen: HashMap<(u32, u32), f32> = HashMap::new();
        for edge in symmetric.edges() {
            prop_assert!(seen.insert((edge.row, edge.col), edge.weight).is_none());
        }
        for (&(row, col), &weight) in &seen {
            prop_assert_eq!(seen.get(&(col, row)), Some(&weight));
            prop_assert_eq!(expected.get(&(row.min(col), row.max(col))), Some(&weight));
        }
        prop_assert_eq!(symmetric.undirected_edges().count(), expected.len());
    }

    #[test]
    fn indptr_partitions_sorted_entries(graph in directed_graph()) {
        let symmetric = MaxSymmetrizer.symmetrize(graph).expect("symmetrize");
        let indptr = PrefixSumCsr.indptr(&symmetric).expect("sorted");
        prop_assert_eq!(indptr.len(), symmetric.n_rows() + 1);
        prop_assert_eq!(indptr[0], 0);
        prop_assert_eq!(*indptr.last().expect("non-empty"), symmetric.nnz());
        for row in 0..symmetric.n_rows() {
            prop_assert!(indptr[row] <= indptr[row + 1]);
            let span = &symmetric.rows()[indptr[row]..indptr[row + 1]];
            prop_assert!(span.iter().all(|&r| r as usize == row));
        }
    }
}
