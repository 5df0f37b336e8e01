//! Scoped device binding.

use tracing::warn;

use crate::error::DeviceError;

use super::{DeviceId, DeviceRuntime};

/// Binds a device to the calling thread and restores the previous binding
/// when dropped, including on early returns and unwinding.
///
/// Use [`DeviceContextGuard::restore`] to observe restoration failures; the
/// drop path can only log them.
///
/// # Examples
/// ```
/// use reachgraph_core::{DeviceContextGuard, DeviceId, DeviceRuntime, HostDeviceRuntime};
///
/// let runtime = HostDeviceRuntime::new(2);
/// assert_eq!(runtime.current_device()?, DeviceId::new(0));
/// {
///     let _guard = DeviceContextGuard::bind(&runtime, DeviceId::new(1))?;
///     assert_eq!(runtime.current_device()?, DeviceId::new(1));
/// }
/// assert_eq!(runtime.current_device()?, DeviceId::new(0));
/// # Ok::<(), reachgraph_core::DeviceError>(())
/// ```
#[derive(Debug)]
#[must_use = "dropping the guard immediately restores the previous device"]
pub struct DeviceContextGuard<'r, R: DeviceRuntime> {
    runtime: &'r R,
    previous: DeviceId,
    bound: DeviceId,
    restored: bool,
}

impl<'r, R: DeviceRuntime> DeviceContextGuard<'r, R> {
    /// Records the current binding and binds `device`.
    ///
    /// # Errors
    /// Returns the runtime's error when the current device cannot be read or
    /// `device` cannot be bound.
    pub fn bind(runtime: &'r R, device: DeviceId) -> Result<Self, DeviceError> {
        let previous = runtime.current_device()?;
        if previous != device {
            runtime.set_current_device(device)?;
        }
        Ok(Self {
            runtime,
            previous,
            bound: device,
            restored: false,
        })
    }

    /// Returns the device that was bound before this guard.
    #[must_use]
    pub fn previous(&self) -> DeviceId {
        self.previous
    }

    /// Returns the device bound by this guard.
    #[must_use]
    pub fn bound(&self) -> DeviceId {
        self.bound
    }

    /// Restores the previous binding and reports failures.
    ///
    /// # Errors
    /// Returns the runtime's error when the previous device cannot be bound.
    pub fn restore(mut self) -> Result<(), DeviceError> {
        self.restored = true;
        self.rebind_previous()
    }

    fn rebind_previous(&self) -> Result<(), DeviceError> {
        if self.previous == self.bound {
            return Ok(());
        }
        self.runtime.set_current_device(self.previous)
    }
}

impl<R: DeviceRuntime> Drop for DeviceContextGuard<'_, R> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(error) = self.rebind_previous() {
            warn!(
                previous = %self.previous,
                bound = %self.bound,
                error = %error,
                "failed to restore device binding"
            );
        }
    }
}
