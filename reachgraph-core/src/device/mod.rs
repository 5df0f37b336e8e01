//! Accelerator device abstraction.
//!
//! The pipeline talks to compute devices through [`DeviceRuntime`]: device
//! discovery, the per-thread "current device" binding, and device-private
//! memory. Memory is handed out as [`DeviceBuffer`] values whose
//! [`MemoryLease`] returns the bytes to the owning [`MemoryLedger`] on drop,
//! so a buffer's lifetime is the allocation's lifetime.
//!
//! [`HostDeviceRuntime`] ships with the crate. It models a configurable
//! number of devices backed by host memory, each with an optional capacity,
//! which keeps the multi-device orchestration path testable without
//! accelerator hardware.

mod buffer;
mod guard;
mod host;

use core::fmt;

pub use self::{
    buffer::{DeviceBuffer, MemoryLease, MemoryLedger},
    guard::DeviceContextGuard,
    host::{HostDeviceRuntime, HostDeviceRuntimeBuilder},
};

use crate::error::DeviceError;

/// Identifies a compute device by ordinal.
///
/// # Examples
/// ```
/// use reachgraph_core::DeviceId;
///
/// let device = DeviceId::new(2);
/// assert_eq!(device.get(), 2);
/// assert_eq!(device.to_string(), "2");
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeviceId(usize);

impl DeviceId {
    /// Creates a device identifier from its ordinal.
    #[must_use]
    pub const fn new(ordinal: usize) -> Self {
        Self(ordinal)
    }

    /// Returns the device ordinal.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime services required to stage data and run searches on devices.
///
/// Implementations must be shareable across the worker threads the
/// orchestrator spawns. The current-device binding is per thread: binding a
/// device on one worker must not change the binding observed by another.
pub trait DeviceRuntime: Sync {
    /// Returns the number of devices available to this process.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] when the runtime cannot enumerate devices.
    fn device_count(&self) -> Result<usize, DeviceError>;

    /// Returns the device bound to the calling thread.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] when no valid device is bound.
    fn current_device(&self) -> Result<DeviceId, DeviceError>;

    /// Binds `device` to the calling thread.
    ///
    /// Prefer [`DeviceContextGuard::bind`], which restores the previous
    /// binding when dropped.
    ///
    /// # Errors
    /// Returns [`DeviceError::UnknownDevice`] when `device` does not exist.
    fn set_current_device(&self, device: DeviceId) -> Result<(), DeviceError>;

    /// Allocates a zero-initialised buffer of `len` elements on `device`.
    ///
    /// # Errors
    /// Returns [`DeviceError::OutOfMemory`] when the device cannot satisfy the
    /// request and [`DeviceError::UnknownDevice`] for unknown devices.
    fn allocate<T>(&self, device: DeviceId, len: usize) -> Result<DeviceBuffer<T>, DeviceError>
    where
        T: Copy + Default + Send;

    /// Allocates a buffer on `device` and copies `host` into it.
    ///
    /// # Errors
    /// Propagates allocation and transfer failures.
    fn upload<T>(&self, device: DeviceId, host: &[T]) -> Result<DeviceBuffer<T>, DeviceError>
    where
        T: Copy + Default + Send,
    {
        let mut buffer = self.allocate(device, host.len())?;
        buffer.copy_from_host(host)?;
        Ok(buffer)
    }
}
