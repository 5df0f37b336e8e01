//! Pipeline entry point for building mutual-reachability graphs.
//!
//! Provides the [`ReachGraph`] runtime entry point, which resolves the
//! execution strategy, runs the nearest-neighbour search, and assembles the
//! graph.

use std::num::NonZeroUsize;

use tracing::{info, instrument, warn};

use crate::{
    Result,
    builder::ExecutionStrategy,
    device::{DeviceRuntime, HostDeviceRuntime},
    error::ReachGraphError,
    graph::{MutualReachabilityGraph, assemble_graph},
    knn::{BruteForceKnn, NeighbourSearch, SearchRequest, WideKnn, ensure_indexable},
    metric::DistanceMetric,
    orchestrator::DeviceOrchestrator,
    points::PointSet,
    sparse::{MaxSymmetrizer, PrefixSumCsr},
};

/// Validated pipeline configuration; build one with
/// [`crate::ReachGraphBuilder`].
///
/// # Examples
/// ```
/// use reachgraph_core::{PointSet, ReachGraphBuilder};
///
/// let values = [0.0, 0.0, 1.0, 0.0, 5.0, 0.0];
/// let points = PointSet::new(&values, 3, 2)?;
/// let graph = ReachGraphBuilder::new()
///     .with_min_samples(2)
///     .build()?
///     .run(points)?;
/// assert_eq!(graph.core_distances(), &[1.0, 1.0, 4.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReachGraph {
    min_samples: NonZeroUsize,
    n_neighbors: NonZeroUsize,
    alpha: f32,
    metric: DistanceMetric,
    execution_strategy: ExecutionStrategy,
    max_devices: Option<NonZeroUsize>,
}

impl ReachGraph {
    pub(crate) fn new(
        min_samples: NonZeroUsize,
        n_neighbors: NonZeroUsize,
        alpha: f32,
        metric: DistanceMetric,
        execution_strategy: ExecutionStrategy,
        max_devices: Option<NonZeroUsize>,
    ) -> Self {
        Self {
            min_samples,
            n_neighbors,
            alpha,
            metric,
            execution_strategy,
            max_devices,
        }
    }

    /// Returns the configured `min_samples`.
    #[must_use]
    pub fn min_samples(&self) -> NonZeroUsize {
        self.min_samples
    }

    /// Returns the number of neighbours searched per point.
    #[must_use]
    pub fn n_neighbors(&self) -> NonZeroUsize {
        self.n_neighbors
    }

    /// Returns the configured `alpha`.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Returns the distance metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns the execution strategy.
    #[must_use]
    pub fn execution_strategy(&self) -> ExecutionStrategy {
        self.execution_strategy
    }

    /// Returns the device cap for multi-device searches.
    #[must_use]
    pub fn max_devices(&self) -> Option<NonZeroUsize> {
        self.max_devices
    }

    /// Builds the graph on a single-device host runtime.
    ///
    /// # Errors
    /// See [`ReachGraph::run_with`].
    pub fn run(&self, points: PointSet<'_>) -> Result<MutualReachabilityGraph> {
        self.run_on(&HostDeviceRuntime::default(), points)
    }

    /// Builds the graph on `runtime` with the brute-force search engine.
    ///
    /// # Errors
    /// See [`ReachGraph::run_with`].
    pub fn run_on<R: DeviceRuntime>(
        &self,
        runtime: &R,
        points: PointSet<'_>,
    ) -> Result<MutualReachabilityGraph> {
        self.run_with(runtime, &BruteForceKnn, points)
    }

    /// Builds the graph on `runtime` with a caller-supplied search engine.
    ///
    /// An empty point set yields `indptr == [0]`, no core distances, and no
    /// edges.
    ///
    /// # Errors
    /// - [`ReachGraphError::TooManyPoints`] when the points cannot be
    ///   addressed by [`crate::PointIndex`].
    /// - [`ReachGraphError::InsufficientPoints`] when the set is non-empty but
    ///   smaller than the neighbourhood.
    /// - Device errors from the search and errors from graph assembly.
    #[instrument(
        name = "core.run",
        err,
        skip(self, runtime, engine, points),
        fields(
            points = points.rows(),
            dimension = points.dimension(),
            min_samples = %self.min_samples,
            n_neighbors = %self.n_neighbors,
            strategy = ?self.execution_strategy,
        ),
    )]
    pub fn run_with<R, S>(
        &self,
        runtime: &R,
        engine: &S,
        points: PointSet<'_>,
    ) -> Result<MutualReachabilityGraph>
    where
        R: DeviceRuntime,
        S: NeighbourSearch,
    {
        let m = points.rows();
        ensure_indexable(m)?;
        if m == 0 {
            warn!("point set is empty, returning an empty graph");
            return Ok(MutualReachabilityGraph::empty());
        }
        if m < self.n_neighbors.get() {
            return Err(ReachGraphError::InsufficientPoints {
                points: m,
                n_neighbors: self.n_neighbors.get(),
            });
        }

        let request = SearchRequest::self_search(points, self.n_neighbors, self.metric);
        let wide = self.search(runtime, engine, &request)?;
        let knn = wide.narrow()?;
        let graph = assemble_graph(
            knn,
            self.min_samples.get(),
            self.alpha,
            &MaxSymmetrizer,
            &PrefixSumCsr,
        )?;
        record_graph_nnz(graph.nnz());
        info!(
            points = m,
            nnz = graph.nnz(),
            self_loops = graph.graph().self_loop_count(),
            "mutual-reachability graph built"
        );
        Ok(graph)
    }

    fn search<R, S>(&self, runtime: &R, engine: &S, request: &SearchRequest<'_>) -> Result<WideKnn>
    where
        R: DeviceRuntime,
        S: NeighbourSearch,
    {
        let available = runtime
            .device_count()
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        if available == 0 {
            return Err(ReachGraphError::NoDevices);
        }
        let multi = match self.execution_strategy {
            ExecutionStrategy::SingleDevice => false,
            ExecutionStrategy::MultiDevice => true,
            ExecutionStrategy::Auto => available > 1,
        };
        if multi {
            return DeviceOrchestrator::new(runtime, engine)
                .with_max_devices(self.max_devices)
                .search(request);
        }
        let device = runtime
            .current_device()
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        engine
            .search(device, request)
            .map_err(|error| ReachGraphError::DeviceSearch { device, error })
    }
}

#[cfg(feature = "metrics")]
fn record_graph_nnz(nnz: usize) {
    metrics::histogram!("reachgraph_graph_nnz").record(nnz as f64);
}

#[cfg(not(feature = "metrics"))]
fn record_graph_nnz(_nnz: usize) {}
