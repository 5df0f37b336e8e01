//! Host-memory device runtime.

use std::{
    sync::Arc,
    thread::{self, ThreadId},
};

use dashmap::DashMap;

use crate::error::DeviceError;

use super::{DeviceBuffer, DeviceId, DeviceRuntime, MemoryLedger};

/// [`DeviceRuntime`] whose devices live in host memory.
///
/// Each device owns a [`MemoryLedger`] with an optional capacity so
/// allocation pressure and failures behave like a real accelerator. The
/// current-device binding is tracked per thread; threads that never bound a
/// device, or were rebound to the default, observe the runtime's default
/// device and hold no entry.
///
/// # Examples
/// ```
/// use reachgraph_core::{DeviceId, DeviceRuntime, HostDeviceRuntime};
///
/// let runtime = HostDeviceRuntime::builder(2)
///     .with_memory_capacity(1024)
///     .build()?;
/// assert_eq!(runtime.device_count()?, 2);
/// let buffer = runtime.upload(DeviceId::new(1), &[1.0_f32, 2.0])?;
/// assert_eq!(runtime.memory_in_use(DeviceId::new(1)), Some(8));
/// drop(buffer);
/// assert_eq!(runtime.memory_in_use(DeviceId::new(1)), Some(0));
/// # Ok::<(), reachgraph_core::DeviceError>(())
/// ```
#[derive(Debug)]
pub struct HostDeviceRuntime {
    ledgers: Vec<Arc<MemoryLedger>>,
    bindings: DashMap<ThreadId, DeviceId>,
    default_device: DeviceId,
}

impl HostDeviceRuntime {
    /// Creates a runtime with `device_count` unbounded devices.
    #[must_use]
    pub fn new(device_count: usize) -> Self {
        Self::from_ledgers(
            (0..device_count)
                .map(|ordinal| Arc::new(MemoryLedger::new(DeviceId::new(ordinal), None)))
                .collect(),
            DeviceId::default(),
        )
    }

    /// Starts configuring a runtime with `device_count` devices.
    #[must_use]
    pub fn builder(device_count: usize) -> HostDeviceRuntimeBuilder {
        HostDeviceRuntimeBuilder::new(device_count)
    }

    fn from_ledgers(ledgers: Vec<Arc<MemoryLedger>>, default_device: DeviceId) -> Self {
        Self {
            ledgers,
            bindings: DashMap::new(),
            default_device,
        }
    }

    /// Returns the ledger for `device`.
    #[must_use]
    pub fn ledger(&self, device: DeviceId) -> Option<&Arc<MemoryLedger>> {
        self.ledgers.get(device.get())
    }

    /// Returns the bytes currently allocated on `device`.
    #[must_use]
    pub fn memory_in_use(&self, device: DeviceId) -> Option<usize> {
        self.ledger(device).map(|ledger| ledger.in_use())
    }

    /// Returns the peak bytes allocated on `device`.
    #[must_use]
    pub fn peak_memory(&self, device: DeviceId) -> Option<usize> {
        self.ledger(device).map(|ledger| ledger.peak())
    }

    /// Returns how many threads currently hold an explicit binding to a
    /// device other than the default.
    #[must_use]
    pub fn bound_thread_count(&self) -> usize {
        self.bindings.len()
    }

    fn checked_ledger(&self, device: DeviceId) -> Result<&Arc<MemoryLedger>, DeviceError> {
        self.ledger(device).ok_or(DeviceError::UnknownDevice {
            device,
            device_count: self.ledgers.len(),
        })
    }
}

impl Default for HostDeviceRuntime {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DeviceRuntime for HostDeviceRuntime {
    fn device_count(&self) -> Result<usize, DeviceError> {
        Ok(self.ledgers.len())
    }

    fn current_device(&self) -> Result<DeviceId, DeviceError> {
        let device = self
            .bindings
            .get(&thread::current().id())
            .map_or(self.default_device, |entry| *entry);
        self.checked_ledger(device)?;
        Ok(device)
    }

    fn set_current_device(&self, device: DeviceId) -> Result<(), DeviceError> {
        self.checked_ledger(device)?;
        let thread = thread::current().id();
        // Threads on the default device hold no entry.
        if device == self.default_device {
            self.bindings.remove(&thread);
        } else {
            self.bindings.insert(thread, device);
        }
        Ok(())
    }

    fn allocate<T>(&self, device: DeviceId, len: usize) -> Result<DeviceBuffer<T>, DeviceError>
    where
        T: Copy + Default + Send,
    {
        DeviceBuffer::allocate(self.checked_ledger(device)?, len)
    }
}

/// Configures a [`HostDeviceRuntime`].
#[derive(Clone, Debug)]
pub struct HostDeviceRuntimeBuilder {
    device_count: usize,
    default_capacity: Option<usize>,
    capacities: Vec<(DeviceId, usize)>,
    default_device: DeviceId,
}

impl HostDeviceRuntimeBuilder {
    fn new(device_count: usize) -> Self {
        Self {
            device_count,
            default_capacity: None,
            capacities: Vec::new(),
            default_device: DeviceId::default(),
        }
    }

    /// Caps every device at `bytes`.
    #[must_use]
    pub fn with_memory_capacity(mut self, bytes: usize) -> Self {
        self.default_capacity = Some(bytes);
        self
    }

    /// Caps `device` at `bytes`, overriding [`Self::with_memory_capacity`].
    #[must_use]
    pub fn with_device_capacity(mut self, device: DeviceId, bytes: usize) -> Self {
        self.capacities.push((device, bytes));
        self
    }

    /// Selects the device observed by threads that never bound one.
    #[must_use]
    pub fn with_default_device(mut self, device: DeviceId) -> Self {
        self.default_device = device;
        self
    }

    /// Builds the runtime.
    ///
    /// # Errors
    /// Returns [`DeviceError::UnknownDevice`] when the default device or a
    /// capacity override names a device outside `0..device_count`. A runtime
    /// with zero devices is valid.
    pub fn build(self) -> Result<HostDeviceRuntime, DeviceError> {
        let unknown = |device: DeviceId| DeviceError::UnknownDevice {
            device,
            device_count: self.device_count,
        };
        if self.device_count > 0 && self.default_device.get() >= self.device_count {
            return Err(unknown(self.default_device));
        }
        if let Some((device, _)) = self
            .capacities
            .iter()
            .find(|(device, _)| device.get() >= self.device_count)
        {
            return Err(unknown(*device));
        }
        let ledgers = (0..self.device_count)
            .map(|ordinal| {
                let device = DeviceId::new(ordinal);
                let capacity = self
                    .capacities
                    .iter()
                    .rev()
                    .find(|(target, _)| *target == device)
                    .map(|(_, bytes)| *bytes)
                    .or(self.default_capacity);
                Arc::new(MemoryLedger::new(device, capacity))
            })
            .collect();
        Ok(HostDeviceRuntime::from_ledgers(ledgers, self.default_device))
    }
}
