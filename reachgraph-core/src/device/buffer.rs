//! Device memory accounting and owned device buffers.

use std::{
    fmt, mem,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::error::DeviceError;

use super::DeviceId;

/// Tracks the bytes allocated on one device against an optional capacity.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use reachgraph_core::{DeviceId, MemoryLedger};
///
/// let ledger = Arc::new(MemoryLedger::new(DeviceId::new(0), Some(64)));
/// let lease = ledger.reserve(48).expect("fits");
/// assert_eq!(ledger.in_use(), 48);
/// assert!(ledger.reserve(32).is_err());
/// drop(lease);
/// assert_eq!(ledger.in_use(), 0);
/// ```
#[derive(Debug)]
pub struct MemoryLedger {
    device: DeviceId,
    capacity: Option<usize>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryLedger {
    /// Creates a ledger for `device`; `None` means unbounded.
    #[must_use]
    pub fn new(device: DeviceId, capacity: Option<usize>) -> Self {
        Self {
            device,
            capacity,
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Returns the device this ledger accounts for.
    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Returns the configured capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns the bytes currently leased.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Returns the largest number of bytes leased at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Reserves `bytes`, returning a lease that releases them on drop.
    ///
    /// # Errors
    /// Returns [`DeviceError::OutOfMemory`] when the reservation would exceed
    /// the capacity.
    pub fn reserve(self: &Arc<Self>, bytes: usize) -> Result<MemoryLease, DeviceError> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            let next = current
                .checked_add(bytes)
                .filter(|&next| self.capacity.is_none_or(|capacity| next <= capacity))
                .ok_or_else(|| DeviceError::OutOfMemory {
                    device: self.device,
                    requested: bytes,
                    available: self
                        .capacity
                        .map_or(usize::MAX, |capacity| capacity.saturating_sub(current)),
                })?;
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::AcqRel);
                    return Ok(MemoryLease {
                        ledger: Arc::clone(self),
                        bytes,
                    });
                }
                Err(observed) => current = observed,
            }
        }
    }
}

/// Bytes held against a [`MemoryLedger`]; released when dropped.
pub struct MemoryLease {
    ledger: Arc<MemoryLedger>,
    bytes: usize,
}

impl MemoryLease {
    /// Returns the number of leased bytes.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl fmt::Debug for MemoryLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLease")
            .field("device", &self.ledger.device)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.ledger.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

/// Buffer resident in a device's private memory.
///
/// The buffer owns both its storage and the [`MemoryLease`] accounting for
/// it; dropping the buffer frees the device memory.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    device: DeviceId,
    data: Vec<T>,
    lease: MemoryLease,
}

impl<T: Copy + Default> DeviceBuffer<T> {
    /// Creates a zero-initialised buffer of `len` elements charged to `ledger`.
    ///
    /// # Errors
    /// Returns [`DeviceError::OutOfMemory`] when the ledger cannot cover the
    /// allocation.
    pub fn allocate(ledger: &Arc<MemoryLedger>, len: usize) -> Result<Self, DeviceError> {
        let bytes = len
            .checked_mul(mem::size_of::<T>())
            .ok_or(DeviceError::OutOfMemory {
                device: ledger.device(),
                requested: usize::MAX,
                available: ledger
                    .capacity()
                    .map_or(usize::MAX, |capacity| capacity.saturating_sub(ledger.in_use())),
            })?;
        let lease = ledger.reserve(bytes)?;
        Ok(Self {
            device: ledger.device(),
            data: vec![T::default(); len],
            lease,
        })
    }

    /// Copies `host` into the buffer.
    ///
    /// # Errors
    /// Returns [`DeviceError::TransferLengthMismatch`] when lengths differ.
    pub fn copy_from_host(&mut self, host: &[T]) -> Result<(), DeviceError> {
        if host.len() != self.data.len() {
            return Err(DeviceError::TransferLengthMismatch {
                device: self.device,
                from_len: host.len(),
                to_len: self.data.len(),
            });
        }
        self.data.copy_from_slice(host);
        Ok(())
    }

    /// Copies the buffer into `destination`.
    ///
    /// # Errors
    /// Returns [`DeviceError::TransferLengthMismatch`] when lengths differ.
    pub fn copy_to_host(&self, destination: &mut [T]) -> Result<(), DeviceError> {
        if destination.len() != self.data.len() {
            return Err(DeviceError::TransferLengthMismatch {
                device: self.device,
                from_len: self.data.len(),
                to_len: destination.len(),
            });
        }
        destination.copy_from_slice(&self.data);
        Ok(())
    }
}

impl<T> DeviceBuffer<T> {
    /// Returns the device holding this buffer.
    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of device bytes charged for the buffer.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.lease.bytes()
    }

    /// Returns the buffer contents.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the buffer contents mutably.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Releases the device memory and hands the contents to the host.
    #[must_use]
    pub fn into_host(self) -> Vec<T> {
        self.data
    }
}
