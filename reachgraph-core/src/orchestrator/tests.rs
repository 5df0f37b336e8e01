use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use proptest::prelude::*;
use rstest::{fixture, rstest};

use crate::{
    device::{DeviceId, DeviceRuntime, HostDeviceRuntime},
    error::{DeviceError, DeviceErrorCode, ReachGraphError},
    knn::{BruteForceKnn, NeighbourSearch, SearchRequest, WideIndex},
    metric::DistanceMetric,
    points::PointSet,
    test_utils::{lattice_points, suite_proptest_config},
};

use super::DeviceOrchestrator;

fn k(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).expect("k must be non-zero")
}

#[fixture]
fn grid() -> Vec<f32> {
    (0..40).map(|value| (value % 7) as f32 + (value / 7) as f32 * 0.5).collect()
}

/// Engine that records the device of every sub-search and can be told to
/// fail on one device.
#[derive(Default)]
struct ScriptedEngine {
    fail_on: Option<DeviceId>,
    calls: Mutex<Vec<(DeviceId, usize)>>,
}

impl ScriptedEngine {
    fn failing_on(device: DeviceId) -> Self {
        Self {
            fail_on: Some(device),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(DeviceId, usize)> {
        let mut calls = self.calls.lock().expect("calls lock").clone();
        calls.sort();
        calls
    }
}

impl NeighbourSearch for ScriptedEngine {
    fn search_into(
        &self,
        device: DeviceId,
        request: &SearchRequest<'_>,
        indices: &mut [WideIndex],
        distances: &mut [f32],
    ) -> Result<(), DeviceError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((device, request.queries.rows()));
        if self.fail_on == Some(device) {
            return Err(DeviceError::SearchFailed {
                device,
                reason: Arc::from("scripted failure"),
            });
        }
        BruteForceKnn.search_into(device, request, indices, distances)
    }
}

fn all_memory_released(runtime: &HostDeviceRuntime, devices: usize) -> bool {
    (0..devices).all(|ordinal| runtime.memory_in_use(DeviceId::new(ordinal)) == Some(0))
}

#[rstest]
#[case::one(1)]
#[case::two(2)]
#[case::three(3)]
#[case::more_devices_than_needed(8)]
fn matches_single_device_search(grid: Vec<f32>, #[case] devices: usize) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(4), DistanceMetric::L2SqrtExpanded);
    let single = BruteForceKnn
        .search(DeviceId::default(), &request)
        .expect("single-device search");

    let runtime = HostDeviceRuntime::new(devices);
    let merged = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect("orchestrated search");
    assert_eq!(merged, single);
    assert!(all_memory_released(&runtime, devices));
}

#[rstest]
fn partitions_rows_with_remainder_on_last_device(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(3);
    let engine = ScriptedEngine::default();
    DeviceOrchestrator::new(&runtime, &engine)
        .search(&request)
        .expect("orchestrated search");
    assert_eq!(
        engine.calls(),
        vec![
            (DeviceId::new(0), 6),
            (DeviceId::new(1), 6),
            (DeviceId::new(2), 8)
        ]
    );
}

#[rstest]
fn distinct_query_sets_are_staged_separately(grid: Vec<f32>) {
    let reference = PointSet::new(&grid, 20, 2).expect("valid reference");
    let query_values = [0.1, 0.1, 6.2, 2.4, 3.0, 1.0];
    let queries = PointSet::new(&query_values, 3, 2).expect("valid queries");
    let request = SearchRequest::new(reference, queries, k(3), DistanceMetric::L2SqrtExpanded);
    let single = BruteForceKnn
        .search(DeviceId::default(), &request)
        .expect("single-device search");

    let runtime = HostDeviceRuntime::new(2);
    let merged = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect("orchestrated search");
    assert_eq!(merged, single);
    let staged = (grid.len() + query_values.len()) * size_of::<f32>();
    assert!(runtime.peak_memory(DeviceId::new(1)) >= Some(staged));
}

#[rstest]
fn max_devices_caps_the_fan_out(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(4);
    let engine = ScriptedEngine::default();
    DeviceOrchestrator::new(&runtime, &engine)
        .with_max_devices(NonZeroUsize::new(2))
        .search(&request)
        .expect("orchestrated search");
    let devices: Vec<_> = engine.calls().into_iter().map(|(device, _)| device).collect();
    assert_eq!(devices, vec![DeviceId::new(0), DeviceId::new(1)]);
    assert_eq!(runtime.peak_memory(DeviceId::new(3)), Some(0));
}

#[rstest]
fn capped_fan_out_keeps_the_home_device(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(4);
    runtime
        .set_current_device(DeviceId::new(3))
        .expect("bind caller device");
    let engine = ScriptedEngine::default();
    let merged = DeviceOrchestrator::new(&runtime, &engine)
        .with_max_devices(NonZeroUsize::new(2))
        .search(&request)
        .expect("orchestrated search");

    assert_eq!(
        engine.calls(),
        vec![(DeviceId::new(0), 10), (DeviceId::new(3), 10)]
    );
    let single = BruteForceKnn
        .search(DeviceId::default(), &request)
        .expect("single-device search");
    assert_eq!(merged, single);
    // Home holds only the merged output; no staged inputs or partials.
    let merged_bytes = request.output_len() * (size_of::<WideIndex>() + size_of::<f32>());
    assert_eq!(runtime.peak_memory(DeviceId::new(3)), Some(merged_bytes));
    assert_eq!(runtime.peak_memory(DeviceId::new(1)), Some(0));
    assert!(runtime.peak_memory(DeviceId::new(0)) >= Some(grid.len() * size_of::<f32>()));
    assert_eq!(runtime.current_device(), Ok(DeviceId::new(3)));
}

#[rstest]
fn repeated_searches_do_not_accumulate_thread_bindings(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(4);
    let orchestrator = DeviceOrchestrator::new(&runtime, &BruteForceKnn);
    for _ in 0..25 {
        orchestrator.search(&request).expect("orchestrated search");
        assert_eq!(runtime.bound_thread_count(), 0);
    }

    runtime
        .set_current_device(DeviceId::new(2))
        .expect("bind caller device");
    for _ in 0..25 {
        orchestrator.search(&request).expect("orchestrated search");
        assert_eq!(runtime.bound_thread_count(), 1);
    }
}

/// Engine that records the device each sub-search was handed next to the
/// device bound on the thread running it.
struct BindingEngine<'r> {
    runtime: &'r HostDeviceRuntime,
    seen: Mutex<Vec<(DeviceId, DeviceId)>>,
}

impl NeighbourSearch for BindingEngine<'_> {
    fn search_into(
        &self,
        device: DeviceId,
        request: &SearchRequest<'_>,
        indices: &mut [WideIndex],
        distances: &mut [f32],
    ) -> Result<(), DeviceError> {
        let bound = self.runtime.current_device()?;
        self.seen.lock().expect("seen lock").push((device, bound));
        BruteForceKnn.search_into(device, request, indices, distances)
    }
}

#[rstest]
fn sub_searches_run_on_a_thread_bound_to_their_device(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(3);
    let engine = BindingEngine {
        runtime: &runtime,
        seen: Mutex::new(Vec::new()),
    };
    DeviceOrchestrator::new(&runtime, &engine)
        .search(&request)
        .expect("orchestrated search");
    let seen = engine.seen.into_inner().expect("seen lock");
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(device, bound)| device == bound));
}

#[rstest]
fn sub_search_failure_aborts_and_releases_everything(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(3);
    let engine = ScriptedEngine::failing_on(DeviceId::new(2));
    let err = DeviceOrchestrator::new(&runtime, &engine)
        .search(&request)
        .expect_err("failing device must abort the call");
    assert!(matches!(
        err,
        ReachGraphError::DeviceSearch {
            device,
            error: DeviceError::SearchFailed { .. },
        } if device == DeviceId::new(2)
    ));
    assert_eq!(err.device_code(), Some(DeviceErrorCode::SearchFailed));
    assert!(all_memory_released(&runtime, 3));
    assert_eq!(runtime.current_device(), Ok(DeviceId::new(0)));
}

#[rstest]
fn staging_out_of_memory_releases_earlier_uploads(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::builder(3)
        .with_device_capacity(DeviceId::new(2), 16)
        .build()
        .expect("runtime must build");
    let err = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect_err("device 2 cannot hold the reference set");
    assert!(matches!(
        err,
        ReachGraphError::DeviceAllocation {
            device,
            error: DeviceError::OutOfMemory { .. },
        } if device == DeviceId::new(2)
    ));
    assert!(runtime.peak_memory(DeviceId::new(1)) > Some(0));
    assert!(all_memory_released(&runtime, 3));
}

#[rstest]
fn partial_buffer_out_of_memory_is_reported(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let reference_bytes = grid.len() * size_of::<f32>();
    let runtime = HostDeviceRuntime::builder(2)
        .with_device_capacity(DeviceId::new(1), reference_bytes + 8)
        .build()
        .expect("runtime must build");
    let err = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect_err("partial outputs do not fit on device 1");
    assert_eq!(err.code().as_str(), "REACHGRAPH_DEVICE_ALLOCATION");
    assert!(all_memory_released(&runtime, 2));
}

#[rstest]
fn caller_binding_is_preserved(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(3), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(3);
    runtime
        .set_current_device(DeviceId::new(1))
        .expect("bind caller device");
    let single = BruteForceKnn
        .search(DeviceId::default(), &request)
        .expect("single-device search");
    let merged = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect("orchestrated search");
    assert_eq!(merged, single);
    assert_eq!(runtime.current_device(), Ok(DeviceId::new(1)));
}

#[rstest]
fn no_devices_is_an_error(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(0);
    let err = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect_err("no devices");
    assert_eq!(err, ReachGraphError::NoDevices);
}

#[rstest]
fn unsupported_metric_fails_before_device_work(grid: Vec<f32>) {
    let points = PointSet::new(&grid, 20, 2).expect("valid points");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::Cosine);
    let runtime = HostDeviceRuntime::new(2);
    let engine = ScriptedEngine::default();
    let err = DeviceOrchestrator::new(&runtime, &engine)
        .search(&request)
        .expect_err("cosine is unsupported");
    assert_eq!(
        err,
        ReachGraphError::UnsupportedMetric {
            metric: DistanceMetric::Cosine
        }
    );
    assert!(engine.calls().is_empty());
    assert_eq!(runtime.peak_memory(DeviceId::new(1)), Some(0));
}

#[rstest]
fn empty_query_set_returns_empty_result() {
    let points = PointSet::new(&[], 0, 2).expect("empty set");
    let request = SearchRequest::self_search(points, k(2), DistanceMetric::L2SqrtExpanded);
    let runtime = HostDeviceRuntime::new(2);
    let knn = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
        .search(&request)
        .expect("empty search");
    assert_eq!(knn.rows(), 0);
    assert!(knn.indices().is_empty());
}

proptest! {
    #![proptest_config(suite_proptest_config(48))]

    #[test]
    fn orchestrated_search_is_device_count_invariant(
        fixture in lattice_points(1..=30, 1..=3),
        devices in 1_usize..=5,
        k_raw in 1_usize..=6,
    ) {
        let k_value = k_raw.min(fixture.rows);
        let points = PointSet::new(&fixture.values, fixture.rows, fixture.dimension)
            .expect("lattice points are valid");
        let request =
            SearchRequest::self_search(points, k(k_value), DistanceMetric::L2SqrtExpanded);
        let single = BruteForceKnn
            .search(DeviceId::default(), &request)
            .expect("single-device search");
        let runtime = HostDeviceRuntime::new(devices);
        let merged = DeviceOrchestrator::new(&runtime, &BruteForceKnn)
            .search(&request)
            .expect("orchestrated search");
        prop_assert_eq!(merged, single);
        prop_assert!(all_memory_released(&runtime, devices));
    }
}
