//! Builder utilities for configuring graph construction.
//!
//! Exposes the execution strategy selection surface and the validation that
//! runs before a [`ReachGraph`] is constructed.

use std::num::NonZeroUsize;

use crate::{
    Result,
    core_distance::validate_neighbourhood,
    error::ReachGraphError,
    metric::DistanceMetric,
    pipeline::ReachGraph,
};

/// Indicates how [`ReachGraph`] runs the nearest-neighbour search.
///
/// `Auto` resolves at run time: it fans out across devices when the runtime
/// reports more than one and searches on the current device otherwise.
///
/// # Examples
/// ```
/// use reachgraph_core::ExecutionStrategy;
///
/// let strategy = ExecutionStrategy::default();
/// assert!(matches!(strategy, ExecutionStrategy::Auto));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Allow the library to choose based on the available devices.
    ///
    /// Picks [`ExecutionStrategy::MultiDevice`] whenever the runtime reports
    /// more than one device, including simulated host devices.
    #[default]
    Auto,
    /// Search on the caller's current device only.
    ///
    /// On [`crate::HostDeviceRuntime`] the search uses the global Rayon pool.
    SingleDevice,
    /// Split the search across every available device.
    ///
    /// Each sub-search runs on a worker thread bound to its device, inside a
    /// pool with one thread per device, so any Rayon parallelism inside the
    /// engine is limited to that pool. On [`crate::HostDeviceRuntime`] this
    /// means `N` simulated devices use `N` CPU threads in total; prefer
    /// [`ExecutionStrategy::SingleDevice`] there when throughput matters more
    /// than exercising the fan-out.
    MultiDevice,
}

/// Configures and constructs [`ReachGraph`] instances.
///
/// # Examples
/// ```
/// use reachgraph_core::{ExecutionStrategy, ReachGraphBuilder};
///
/// let reach = ReachGraphBuilder::new()
///     .with_min_samples(4)
///     .with_neighbourhood_size(8)
///     .with_execution_strategy(ExecutionStrategy::SingleDevice)
///     .build()
///     .expect("builder configuration is valid");
/// assert_eq!(reach.min_samples().get(), 4);
/// assert_eq!(reach.n_neighbors().get(), 8);
/// assert_eq!(reach.execution_strategy(), ExecutionStrategy::SingleDevice);
/// ```
#[derive(Debug, Clone)]
pub struct ReachGraphBuilder {
    min_samples: usize,
    n_neighbors: Option<usize>,
    alpha: f32,
    metric: DistanceMetric,
    execution_strategy: ExecutionStrategy,
    max_devices: Option<NonZeroUsize>,
}

impl Default for ReachGraphBuilder {
    fn default() -> Self {
        Self {
            min_samples: 5,
            n_neighbors: None,
            alpha: 1.0,
            metric: DistanceMetric::default(),
            execution_strategy: ExecutionStrategy::Auto,
            max_devices: None,
        }
    }
}

impl ReachGraphBuilder {
    /// Creates a builder populated with default parameters.
    ///
    /// # Examples
    /// ```
    /// use reachgraph_core::{DistanceMetric, ExecutionStrategy, ReachGraphBuilder};
    ///
    /// let builder = ReachGraphBuilder::new();
    /// assert_eq!(builder.min_samples(), 5);
    /// assert_eq!(builder.alpha(), 1.0);
    /// assert_eq!(builder.metric(), DistanceMetric::L2SqrtExpanded);
    /// assert_eq!(builder.execution_strategy(), ExecutionStrategy::Auto);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides `min_samples`, the neighbour rank (self included) that
    /// defines a point's core distance.
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Returns the configured `min_samples`.
    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Searches `n_neighbors` neighbours per point instead of `min_samples`.
    ///
    /// A larger neighbourhood adds edges to the graph without changing the
    /// core distances.
    ///
    /// # Examples
    /// ```
    /// use reachgraph_core::{ReachGraphBuilder, ReachGraphError};
    ///
    /// let err = ReachGraphBuilder::new()
    ///     .with_min_samples(6)
    ///     .with_neighbourhood_size(4)
    ///     .build()
    ///     .expect_err("neighbourhood smaller than min_samples");
    /// assert!(matches!(err, ReachGraphError::MinSamplesExceedsNeighbourhood { .. }));
    /// ```
    #[must_use]
    pub fn with_neighbourhood_size(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = Some(n_neighbors);
        self
    }

    /// Returns the explicit neighbourhood size, if one was set.
    #[must_use]
    pub fn neighbourhood_size(&self) -> Option<usize> {
        self.n_neighbors
    }

    /// Overrides `alpha`; mutual-reachability weights are divided by it.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Returns the configured `alpha`.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Overrides the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Returns the configured distance metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Sets the execution strategy to use when running the pipeline.
    ///
    /// # Examples
    /// ```
    /// use reachgraph_core::{ExecutionStrategy, ReachGraphBuilder};
    ///
    /// let builder = ReachGraphBuilder::new().with_execution_strategy(ExecutionStrategy::MultiDevice);
    /// assert_eq!(builder.execution_strategy(), ExecutionStrategy::MultiDevice);
    /// ```
    #[must_use]
    pub fn with_execution_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.execution_strategy = strategy;
        self
    }

    /// Returns the currently configured execution strategy.
    #[must_use]
    pub fn execution_strategy(&self) -> ExecutionStrategy {
        self.execution_strategy
    }

    /// Caps the number of devices a multi-device search uses.
    #[must_use]
    pub fn with_max_devices(mut self, max_devices: NonZeroUsize) -> Self {
        self.max_devices = Some(max_devices);
        self
    }

    /// Returns the device cap, if any.
    #[must_use]
    pub fn max_devices(&self) -> Option<NonZeroUsize> {
        self.max_devices
    }

    /// Validates the configuration and constructs a [`ReachGraph`].
    ///
    /// # Errors
    /// - [`ReachGraphError::InvalidMinSamples`] when `min_samples == 0`.
    /// - [`ReachGraphError::MinSamplesExceedsNeighbourhood`] when an explicit
    ///   neighbourhood is smaller than `min_samples`.
    /// - [`ReachGraphError::InvalidAlpha`] when `alpha` is below one or not
    ///   finite.
    /// - [`ReachGraphError::UnsupportedMetric`] for any metric other than
    ///   [`DistanceMetric::L2SqrtExpanded`].
    ///
    /// # Examples
    /// ```
    /// use reachgraph_core::ReachGraphBuilder;
    ///
    /// let reach = ReachGraphBuilder::new().build().expect("configuration is valid");
    /// assert_eq!(reach.min_samples().get(), 5);
    /// assert_eq!(reach.n_neighbors().get(), 5);
    /// ```
    pub fn build(self) -> Result<ReachGraph> {
        let min_samples =
            NonZeroUsize::new(self.min_samples).ok_or(ReachGraphError::InvalidMinSamples {
                got: self.min_samples,
            })?;
        let n_neighbors = self.n_neighbors.unwrap_or(self.min_samples);
        validate_neighbourhood(self.min_samples, n_neighbors)?;
        let n_neighbors = NonZeroUsize::new(n_neighbors).ok_or(
            ReachGraphError::MinSamplesExceedsNeighbourhood {
                min_samples: self.min_samples,
                n_neighbors,
            },
        )?;
        if !self.alpha.is_finite() || self.alpha < 1.0 {
            return Err(ReachGraphError::InvalidAlpha { alpha: self.alpha });
        }
        self.metric.ensure_supported()?;

        Ok(ReachGraph::new(
            min_samples,
            n_neighbors,
            self.alpha,
            self.metric,
            self.execution_strategy,
            self.max_devices,
        ))
    }
}
