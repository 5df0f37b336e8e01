//! Mutual-reachability graph construction.
//!
//! Builds the symmetric sparse graph that density-based clustering consumes:
//! exact k-nearest-neighbour search (optionally fanned out across several
//! devices), core distances, the mutual-reachability rewrite, and COO/CSR
//! assembly.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod core_distance;
mod device;
mod error;
mod graph;
mod knn;
mod memory;
mod metric;
mod orchestrator;
mod pipeline;
mod points;
mod reachability;
mod sparse;

#[cfg(test)]
mod test_utils;

pub use crate::{
    builder::{ExecutionStrategy, ReachGraphBuilder},
    core_distance::{core_distances, validate_neighbourhood},
    device::{
        DeviceBuffer, DeviceContextGuard, DeviceId, DeviceRuntime, HostDeviceRuntime,
        HostDeviceRuntimeBuilder, MemoryLease, MemoryLedger,
    },
    error::{
        DeviceError, DeviceErrorCode, PointSetError, PointSetErrorCode, ReachGraphError,
        ReachGraphErrorCode, Result,
    },
    graph::{MutualReachabilityGraph, assemble_graph, mutual_reachability_graph},
    knn::{
        BruteForceKnn, KnnResult, MAX_POINTS, Neighbour, NeighbourSearch, PointIndex,
        SearchRequest, WideIndex, WideKnn, ensure_indexable, narrow_indices,
    },
    memory::{estimate_peak_bytes, format_bytes},
    metric::DistanceMetric,
    orchestrator::{
        DeviceOrchestrator, OrchestrationPhase, RowChunk, partition_rows, partition_rows_across,
    },
    pipeline::ReachGraph,
    points::PointSet,
    reachability::{mutual_reachability, transform},
    sparse::{
        CooGraph, CsrConversion, Edge, MaxSymmetrizer, PrefixSumCsr, Symmetrize, knn_to_coo,
        saturate_self_loops,
    },
};
