//! Per-call staging of search inputs on worker devices.

use tracing::debug;

use crate::{
    device::{DeviceBuffer, DeviceContextGuard, DeviceId, DeviceRuntime},
    error::{ReachGraphError, Result},
    knn::SearchRequest,
    points::PointSet,
};

/// Search inputs as seen by one device.
#[derive(Debug)]
pub(crate) enum StagedInputs<'a> {
    /// The home device reads the caller's buffers directly.
    Host {
        reference: PointSet<'a>,
        queries: PointSet<'a>,
    },
    /// Copies resident on a worker device.
    Device {
        reference: DeviceBuffer<f32>,
        /// `None` when queries are rows of the reference set and share its
        /// buffer.
        queries: Option<DeviceBuffer<f32>>,
        shape: StagedShape,
    },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct StagedShape {
    reference_rows: usize,
    query_rows: usize,
    dimension: usize,
    query_offset: Option<usize>,
}

impl StagedInputs<'_> {
    pub(crate) fn reference(&self) -> PointSet<'_> {
        match self {
            Self::Host { reference, .. } => *reference,
            Self::Device {
                reference, shape, ..
            } => PointSet::from_validated(reference.as_slice(), shape.reference_rows, shape.dimension),
        }
    }

    pub(crate) fn queries(&self) -> PointSet<'_> {
        match self {
            Self::Host { queries, .. } => *queries,
            Self::Device {
                queries: Some(queries),
                shape,
                ..
            } => PointSet::from_validated(queries.as_slice(), shape.query_rows, shape.dimension),
            Self::Device {
                queries: None,
                shape,
                ..
            } => {
                let offset = shape.query_offset.unwrap_or_default();
                self.reference()
                    .slice_rows(offset..offset + shape.query_rows)
                    .unwrap_or(self.reference())
            }
        }
    }

    pub(crate) fn bytes(&self) -> usize {
        match self {
            Self::Host { .. } => 0,
            Self::Device {
                reference, queries, ..
            } => reference.bytes() + queries.as_ref().map_or(0, DeviceBuffer::bytes),
        }
    }
}

/// Device copies owned by a single orchestrated search.
///
/// Dropping the arena, or any [`StagedInputs`] taken from it, frees the
/// corresponding device memory.
#[derive(Debug)]
pub(crate) struct StagingArena<'a> {
    inputs: Vec<StagedInputs<'a>>,
}

impl<'a> StagingArena<'a> {
    /// Stages `request` for each of `devices`, in order.
    ///
    /// The home device borrows the caller's buffers. Other devices receive
    /// uploaded copies; when the queries are rows of the reference set only
    /// the reference is uploaded.
    pub(crate) fn stage<R: DeviceRuntime>(
        runtime: &R,
        request: &SearchRequest<'a>,
        home: DeviceId,
        devices: &[DeviceId],
    ) -> Result<Self> {
        let mut inputs = Vec::with_capacity(devices.len());
        for &device in devices {
            if device == home {
                inputs.push(StagedInputs::Host {
                    reference: request.reference,
                    queries: request.queries,
                });
                continue;
            }
            let _guard = DeviceContextGuard::bind(runtime, device)
                .map_err(|error| ReachGraphError::DeviceContext { error })?;
            let reference = upload(runtime, device, request.reference.values())?;
            let queries = match request.self_offset {
                Some(_) => None,
                None => Some(upload(runtime, device, request.queries.values())?),
            };
            let staged = StagedInputs::Device {
                reference,
                queries,
                shape: StagedShape {
                    reference_rows: request.reference.rows(),
                    query_rows: request.queries.rows(),
                    dimension: request.reference.dimension(),
                    query_offset: request.self_offset,
                },
            };
            debug!(device = %device, bytes = staged.bytes(), "inputs staged");
            inputs.push(staged);
        }
        Ok(Self { inputs })
    }

    /// Returns the device bytes held by the arena.
    pub(crate) fn bytes(&self) -> usize {
        self.inputs.iter().map(StagedInputs::bytes).sum()
    }

    /// Hands each device its inputs, in device order.
    pub(crate) fn into_inputs(self) -> Vec<StagedInputs<'a>> {
        self.inputs
    }
}

fn upload<R: DeviceRuntime>(
    runtime: &R,
    device: DeviceId,
    host: &[f32],
) -> Result<DeviceBuffer<f32>> {
    let mut buffer = runtime
        .allocate(device, host.len())
        .map_err(|error| ReachGraphError::DeviceAllocation { device, error })?;
    buffer
        .copy_from_host(host)
        .map_err(|error| ReachGraphError::DeviceTransfer { device, error })?;
    Ok(buffer)
}
