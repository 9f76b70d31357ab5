// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    buffer::DspBuffer,
    channel::{Channel, Namespace, SyncDirection, SyncPhase, XrpChannel},
    error::{invalid_argument, Error, Result},
};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error, warn};

/// Where to find the accelerator and which firmware module to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub namespace: Namespace,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(xrp_sys::XRP_DEVICE_PATH),
            namespace: Namespace::IMAGING,
        }
    }
}

/// An open accelerator channel.
///
/// Commands built from independent threads may be submitted through a shared
/// `Device`; each call builds its own request and buffer list and the driver
/// serializes access to the hardware queues.
///
/// Buffers allocated through the device are tracked in a side table keyed by
/// address, so releasing or syncing an address that is not a live allocation
/// fails with [`Error::InvalidArgument`] instead of touching freed memory.
///
/// # Example
///
/// ```no_run
/// use dsp_imaging::{Device, SyncDirection};
///
/// # fn main() -> Result<(), dsp_imaging::Error> {
/// let device = Device::open()?;
/// let mut buffer = device.allocate_buffer(4096)?;
///
/// buffer.sync_start(SyncDirection::Write)?;
/// buffer.as_mut_slice().fill(0x80);
/// buffer.sync_end(SyncDirection::Write)?;
///
/// buffer.release()?;
/// device.release();
/// # Ok(())
/// # }
/// ```
pub struct Device {
    channel: Box<dyn Channel>,
    namespace: Namespace,
    allocations: Mutex<HashMap<u64, usize>>,
}

impl Device {
    /// Opens the default device node for the imaging namespace.
    pub fn open() -> Result<Self> {
        Self::open_with(&DeviceConfig::default())
    }

    /// # Errors
    ///
    /// Returns [`Error::OpenDeviceFailed`] if the device node cannot be
    /// opened and [`Error::CreateQueueFailed`] if it opens but the driver
    /// refuses requests.
    pub fn open_with(config: &DeviceConfig) -> Result<Self> {
        let channel = XrpChannel::open(&config.path)?;
        Self::with_channel(Box::new(channel), config.namespace)
    }

    /// Wraps an already opened channel.
    ///
    /// The channel is probed with a statistics query before use.
    pub fn with_channel(channel: Box<dyn Channel>, namespace: Namespace) -> Result<Self> {
        if let Err(e) = channel.statistics(false) {
            error!("DSP channel does not accept requests: {e}");
            let errno = match e {
                Error::IoctlFailed(errno) => errno,
                _ => nix::errno::Errno::EIO,
            };
            return Err(Error::CreateQueueFailed(errno));
        }
        debug!("DSP device ready, namespace {namespace}");
        Ok(Self {
            channel,
            namespace,
            allocations: Mutex::new(HashMap::new()),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub(crate) fn channel(&self) -> &dyn Channel {
        self.channel.as_ref()
    }

    fn allocations(&self) -> MutexGuard<'_, HashMap<u64, usize>> {
        self.allocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Closes the channel. Allocations still registered at this point are
    /// returned to the driver first.
    pub fn release(self) {
        let leaked: Vec<(u64, usize)> = self.allocations().drain().collect();
        for (addr, size) in leaked {
            warn!("releasing leaked DSP buffer {addr:#x} ({size} bytes)");
            if let Err(e) = self.channel.free(addr, size) {
                warn!("failed to free leaked DSP buffer {addr:#x}: {e}");
            }
        }
        debug!("DSP device released");
    }

    /// Allocates a physically contiguous, cache-line aligned buffer.
    pub fn allocate_buffer(&self, size: usize) -> Result<DspBuffer<'_>> {
        if size == 0 {
            return Err(invalid_argument!("buffer size is 0"));
        }

        self.allocations().try_reserve(1).map_err(|e| {
            error!("failed to track DSP buffer: {e}");
            Error::OutOfHostMemory
        })?;

        // The side table is not locked across the driver call.
        let addr = self.channel.allocate(size)?;
        if addr == 0 {
            error!("driver returned a null DSP buffer for {size} bytes");
            return Err(Error::CreateBufferFailed {
                size,
                reason: "driver returned a null address".to_owned(),
            });
        }
        self.allocations().insert(addr, size);
        debug!("DSP buffer {addr:#x} allocated ({size} bytes)");
        Ok(DspBuffer::new(self, addr, size))
    }

    /// Returns a buffer to the driver.
    ///
    /// A buffer allocated by another device is rejected. It is still freed by
    /// its own device when dropped.
    pub fn release_buffer(&self, buffer: DspBuffer<'_>) -> Result<()> {
        if !std::ptr::eq(buffer.device(), self) {
            return Err(invalid_argument!(
                "DSP buffer {:#x} was allocated by another device",
                buffer.addr()
            ));
        }
        buffer.release()
    }

    /// Frees the allocation at `addr`, forgetting it first so it can never be
    /// freed twice.
    pub(crate) fn free(&self, addr: u64) -> Result<()> {
        let size = self.allocations().remove(&addr).ok_or_else(|| {
            invalid_argument!("buffer {addr:#x} is not a live allocation of this device")
        })?;
        self.channel.free(addr, size)?;
        debug!("DSP buffer {addr:#x} released");
        Ok(())
    }

    fn sync(&self, addr: u64, direction: SyncDirection, phase: SyncPhase) -> Result<()> {
        let size = self.allocations().get(&addr).copied().ok_or_else(|| {
            invalid_argument!("cannot sync buffer {addr:#x}, it is not a live allocation")
        })?;
        self.channel.sync(addr, size, direction, phase)
    }

    /// Opens a CPU access window on the allocation at `addr`.
    pub fn sync_start(&self, addr: u64, direction: SyncDirection) -> Result<()> {
        self.sync(addr, direction, SyncPhase::Start)
    }

    /// Closes a CPU access window, handing the allocation back to the
    /// accelerator.
    pub fn sync_end(&self, addr: u64, direction: SyncDirection) -> Result<()> {
        self.sync(addr, direction, SyncPhase::End)
    }

    /// Number of buffers currently allocated through this device.
    pub fn live_buffers(&self) -> usize {
        self.allocations().len()
    }
}
