//! Multi-device nearest-neighbour search.
//!
//! [`DeviceOrchestrator`] splits the query rows of a [`SearchRequest`]
//! across every available device and runs one sub-search per device in
//! parallel. A call moves through the phases of [`OrchestrationPhase`]:
//!
//! 1. **Discover** the devices and the caller's current device (home).
//! 2. **Stage** copies of the inputs on every non-home device.
//! 3. **Partition** the query rows into contiguous per-device chunks.
//! 4. **Dispatch** one sub-search per device on a dedicated worker pool.
//! 5. **Gather** device-private partial results into the merged output.
//! 6. **Finalize** by restoring the caller's device binding.
//!
//! Staged copies and partial buffers are owned by the call and released on
//! every exit path. Any failure aborts the whole call; partial results are
//! never returned.

mod partition;
mod staging;

use std::{fmt, num::NonZeroUsize};

use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::{debug, info, instrument};

pub use self::partition::{RowChunk, partition_rows, partition_rows_across};

use self::staging::{StagedInputs, StagingArena};
use crate::{
    device::{DeviceBuffer, DeviceContextGuard, DeviceId, DeviceRuntime},
    error::{ReachGraphError, Result},
    knn::{NeighbourSearch, SearchRequest, WideIndex, WideKnn},
};

/// Phases of an orchestrated search.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrchestrationPhase {
    /// Enumerate devices and record the caller's binding.
    Discover,
    /// Copy inputs to non-home devices.
    Stage,
    /// Assign query rows to devices.
    Partition,
    /// Run the per-device sub-searches.
    Dispatch,
    /// Copy partial results into the merged output.
    Gather,
    /// Restore the caller's binding and return the merged output.
    Finalize,
}

impl OrchestrationPhase {
    /// Returns the lowercase phase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Stage => "stage",
            Self::Partition => "partition",
            Self::Dispatch => "dispatch",
            Self::Gather => "gather",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for OrchestrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs exact nearest-neighbour searches across all devices of a runtime.
///
/// The merged output is identical to a single-device search with the same
/// engine, provided the engine is deterministic.
///
/// Sub-searches run on a dedicated pool with one thread per device, each
/// thread bound to its device for the whole sub-search. Rayon work spawned by
/// the engine stays on that pool.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use reachgraph_core::{
///     BruteForceKnn, DeviceOrchestrator, DistanceMetric, HostDeviceRuntime, PointSet,
///     SearchRequest,
/// };
///
/// let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
/// let points = PointSet::new(&values, 6, 2)?;
/// let request = SearchRequest::self_search(
///     points,
///     NonZeroUsize::new(2).expect("non-zero"),
///     DistanceMetric::L2SqrtExpanded,
/// );
/// let runtime = HostDeviceRuntime::new(3);
/// let knn = DeviceOrchestrator::new(&runtime, &BruteForceKnn).search(&request)?;
/// assert_eq!(knn.rows(), 6);
/// assert_eq!(&knn.indices()[..2], &[0, 1]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DeviceOrchestrator<'e, R, S> {
    runtime: &'e R,
    engine: &'e S,
    max_devices: Option<NonZeroUsize>,
}

impl<'e, R, S> DeviceOrchestrator<'e, R, S>
where
    R: DeviceRuntime,
    S: NeighbourSearch,
{
    /// Creates an orchestrator that uses every device of `runtime`.
    #[must_use]
    pub fn new(runtime: &'e R, engine: &'e S) -> Self {
        Self {
            runtime,
            engine,
            max_devices: None,
        }
    }

    /// Limits the number of devices used per call.
    #[must_use]
    pub fn with_max_devices(mut self, max_devices: Option<NonZeroUsize>) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Searches `request` across the available devices.
    ///
    /// # Errors
    /// - [`ReachGraphError::UnsupportedMetric`] before any device work.
    /// - [`ReachGraphError::NoDevices`] when the runtime reports no device.
    /// - [`ReachGraphError::DeviceContext`] when devices cannot be enumerated
    ///   or bound.
    /// - [`ReachGraphError::DeviceAllocation`] and
    ///   [`ReachGraphError::DeviceTransfer`] for staging and gather failures.
    /// - [`ReachGraphError::DeviceSearch`] when a sub-search fails; the lowest
    ///   failing device is reported.
    /// - [`ReachGraphError::DevicePool`] when the worker pool cannot start.
    #[instrument(
        name = "core.orchestrate",
        err,
        skip(self, request),
        fields(
            queries = request.queries.rows(),
            k = request.k.get(),
            devices = tracing::field::Empty,
        ),
    )]
    pub fn search(&self, request: &SearchRequest<'_>) -> Result<WideKnn> {
        request.metric.ensure_supported()?;

        enter(OrchestrationPhase::Discover);
        let (home, participants) = self.discover(request.queries.rows())?;
        let devices = participants.len();
        tracing::Span::current().record("devices", devices);
        let call_guard = DeviceContextGuard::bind(self.runtime, home)
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        request
            .validate(home, request.output_len(), request.output_len())
            .map_err(|error| ReachGraphError::DeviceSearch {
                device: home,
                error,
            })?;
        let k = request.k.get();
        if devices == 0 {
            enter(OrchestrationPhase::Finalize);
            call_guard
                .restore()
                .map_err(|error| ReachGraphError::DeviceContext { error })?;
            return Ok(WideKnn::from_parts(0, k, Vec::new(), Vec::new()));
        }

        enter(OrchestrationPhase::Stage);
        let arena = StagingArena::stage(self.runtime, request, home, &participants)?;
        record_staged_bytes(arena.bytes());

        enter(OrchestrationPhase::Partition);
        let chunks = partition_rows_across(request.queries.rows(), &participants);

        enter(OrchestrationPhase::Dispatch);
        let len = request.output_len();
        let mut merged_indices: DeviceBuffer<WideIndex> = self
            .runtime
            .allocate(home, len)
            .map_err(|error| ReachGraphError::DeviceAllocation { device: home, error })?;
        let mut merged_distances: DeviceBuffer<f32> = self
            .runtime
            .allocate(home, len)
            .map_err(|error| ReachGraphError::DeviceAllocation { device: home, error })?;
        let slots = split_outputs(
            &chunks,
            k,
            merged_indices.as_mut_slice(),
            merged_distances.as_mut_slice(),
        );
        let work: Vec<_> = chunks
            .into_iter()
            .zip(arena.into_inputs())
            .zip(slots)
            .map(|((chunk, inputs), (indices, distances))| DeviceWork {
                chunk,
                inputs,
                indices,
                distances,
            })
            .collect();
        self.dispatch(request, home, work)?;

        enter(OrchestrationPhase::Finalize);
        call_guard
            .restore()
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        info!(devices, outputs = len, "orchestrated search complete");
        Ok(WideKnn::from_parts(
            request.queries.rows(),
            k,
            merged_indices.into_host(),
            merged_distances.into_host(),
        ))
    }

    /// Returns the home device and the devices taking part in the call.
    ///
    /// At most `min(available, max_devices, queries)` devices take part, and
    /// the home device is always one of them.
    fn discover(&self, queries: usize) -> Result<(DeviceId, Vec<DeviceId>)> {
        let available = self
            .runtime
            .device_count()
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        if available == 0 {
            return Err(ReachGraphError::NoDevices);
        }
        let home = self
            .runtime
            .current_device()
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        let capped = self
            .max_devices
            .map_or(available, |max| available.min(max.get()));
        let participants = select_devices(home, capped.min(queries));
        debug!(
            available,
            devices = participants.len(),
            home = %home,
            "devices discovered"
        );
        Ok((home, participants))
    }

    fn dispatch(
        &self,
        request: &SearchRequest<'_>,
        home: DeviceId,
        work: Vec<DeviceWork<'_, '_>>,
    ) -> Result<()> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(work.len())
            .thread_name(|index| format!("reachgraph-device-{index}"))
            .build()
            .map_err(|error| ReachGraphError::DevicePool {
                message: error.to_string().into(),
            })?;
        let outcomes: Vec<Result<()>> = pool.install(|| {
            work.into_par_iter()
                .map(|item| self.run_device(request, home, item))
                .collect()
        });
        outcomes.into_iter().collect()
    }

    #[instrument(
        name = "core.orchestrate.device",
        err,
        skip(self, request, home, work),
        fields(device = %work.chunk.device, start = work.chunk.start, rows = work.chunk.len),
    )]
    fn run_device(
        &self,
        request: &SearchRequest<'_>,
        home: DeviceId,
        work: DeviceWork<'_, '_>,
    ) -> Result<()> {
        let DeviceWork {
            chunk,
            inputs,
            indices,
            distances,
        } = work;
        let device = chunk.device;
        let guard = DeviceContextGuard::bind(self.runtime, device)
            .map_err(|error| ReachGraphError::DeviceContext { error })?;
        let queries = inputs
            .queries()
            .slice_rows(chunk.rows())
            .ok_or(ReachGraphError::ShapeMismatch {
                buffer: "staged_queries",
                expected: chunk.rows().end,
                actual: inputs.queries().rows(),
            })?;
        let sub_request = SearchRequest {
            reference: inputs.reference(),
            queries,
            k: request.k,
            metric: request.metric,
            self_offset: request.self_offset.map(|offset| offset + chunk.start),
        };
        let search_error = |error| ReachGraphError::DeviceSearch { device, error };

        if device == home {
            self.engine
                .search_into(device, &sub_request, indices, distances)
                .map_err(search_error)?;
        } else {
            let mut partial_indices: DeviceBuffer<WideIndex> = self
                .runtime
                .allocate(device, indices.len())
                .map_err(|error| ReachGraphError::DeviceAllocation { device, error })?;
            let mut partial_distances: DeviceBuffer<f32> = self
                .runtime
                .allocate(device, distances.len())
                .map_err(|error| ReachGraphError::DeviceAllocation { device, error })?;
            self.engine
                .search_into(
                    device,
                    &sub_request,
                    partial_indices.as_mut_slice(),
                    partial_distances.as_mut_slice(),
                )
                .map_err(search_error)?;

            enter(OrchestrationPhase::Gather);
            let transfer_error = |error| ReachGraphError::DeviceTransfer { device, error };
            partial_indices
                .copy_to_host(indices)
                .map_err(transfer_error)?;
            partial_distances
                .copy_to_host(distances)
                .map_err(transfer_error)?;
        }
        drop(inputs);
        record_device_search();
        guard
            .restore()
            .map_err(|error| ReachGraphError::DeviceContext { error })
    }
}

/// Picks `count` devices in ascending order: the lowest ordinals, with the
/// highest of them swapped for `home` when `home` would be left out.
fn select_devices(home: DeviceId, count: usize) -> Vec<DeviceId> {
    if count == 0 {
        return Vec::new();
    }
    let mut devices: Vec<DeviceId> = (0..count).map(DeviceId::new).collect();
    if home.get() >= count {
        devices.pop();
        devices.push(home);
    }
    devices
}

/// Everything one device worker owns for the duration of a call.
struct DeviceWork<'a, 'o> {
    chunk: RowChunk,
    inputs: StagedInputs<'a>,
    indices: &'o mut [WideIndex],
    distances: &'o mut [f32],
}

/// Splits the merged outputs into disjoint per-chunk slices.
fn split_outputs<'o>(
    chunks: &[RowChunk],
    k: usize,
    mut indices: &'o mut [WideIndex],
    mut distances: &'o mut [f32],
) -> Vec<(&'o mut [WideIndex], &'o mut [f32])> {
    let mut slots = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let (chunk_indices, rest_indices) = indices.split_at_mut(chunk.len * k);
        let (chunk_distances, rest_distances) = distances.split_at_mut(chunk.len * k);
        slots.push((chunk_indices, chunk_distances));
        indices = rest_indices;
        distances = rest_distances;
    }
    slots
}

fn enter(phase: OrchestrationPhase) {
    debug!(phase = %phase, "orchestration phase");
}

#[cfg(feature = "metrics")]
fn record_staged_bytes(bytes: usize) {
    metrics::counter!("reachgraph_staged_bytes").increment(bytes as u64);
}

#[cfg(not(feature = "metrics"))]
fn record_staged_bytes(_bytes: usize) {}

#[cfg(feature = "metrics")]
fn record_device_search() {
    metrics::counter!("reachgraph_device_searches").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_device_search() {}

#[cfg(test)]
mod tests;
