// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The path to the accelerator: a [`Channel`] trait for the driver's small
//! ioctl vocabulary and its implementation on top of the XRP device node.

use crate::{
    error::{invalid_argument, Error, Result},
    registry::BufferEntry,
    stats::KernelStatistics,
};
use core::fmt;
use std::{
    fs::{File, OpenOptions},
    mem::size_of,
    os::fd::AsRawFd,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error};
use xrp_sys::{
    xrp_ioctl_alloc, xrp_ioctl_buffer, xrp_ioctl_queue, xrp_ioctl_stats, xrp_ioctl_sync_buffer,
    XRP_NAMESPACE_ID_SIZE,
};

/// Alignment requested for every driver allocation, one cache line.
pub const ALLOCATION_ALIGNMENT: u32 = 64;

/// Identifier of the firmware module a command is routed to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace([u8; XRP_NAMESPACE_ID_SIZE]);

impl Namespace {
    pub const IMAGING: Namespace = Namespace(*b"imagingnamespace");
    pub const UTILIZATION: Namespace = Namespace(*b"utilization_nsid");

    /// Builds a namespace from a 16 character ASCII token.
    pub fn new(id: &str) -> Result<Self> {
        let bytes: [u8; XRP_NAMESPACE_ID_SIZE] = id.as_bytes().try_into().map_err(|_| {
            invalid_argument!(
                "namespace {id:?} must be exactly {XRP_NAMESPACE_ID_SIZE} bytes long"
            )
        })?;
        if !bytes.is_ascii() {
            return Err(invalid_argument!("namespace {id:?} must be ASCII"));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; XRP_NAMESPACE_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Namespace({self})")
    }
}

/// Which side's view of a buffer a sync makes coherent.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    Read = xrp_sys::XRP_SYNC_DIRECTION_READ,
    Write = xrp_sys::XRP_SYNC_DIRECTION_WRITE,
    ReadWrite = xrp_sys::XRP_SYNC_DIRECTION_BOTH,
}

/// Whether a sync opens or closes a CPU access window.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Start = xrp_sys::XRP_FLAG_BUFFER_SYNC_START,
    End = xrp_sys::XRP_FLAG_BUFFER_SYNC_END,
}

/// Operations offered by the accelerator driver.
///
/// [`XrpChannel`] talks to the kernel; other implementations let the
/// marshaling layer run without hardware. Every call blocks until the driver
/// returns.
pub trait Channel: Send + Sync {
    /// Allocates physically contiguous memory and returns its user-space
    /// address.
    fn allocate(&self, size: usize) -> Result<u64>;

    fn free(&self, addr: u64, size: usize) -> Result<()>;

    fn sync(&self, addr: u64, size: usize, direction: SyncDirection, phase: SyncPhase)
        -> Result<()>;

    /// Runs one command to completion. `output` receives the firmware's
    /// response payload.
    fn submit(
        &self,
        namespace: Option<&Namespace>,
        input: &[u8],
        output: &mut [u8],
        buffers: &[BufferEntry],
    ) -> Result<()>;

    fn statistics(&self, reset: bool) -> Result<KernelStatistics>;
}

impl<C: Channel + ?Sized> Channel for Arc<C> {
    fn allocate(&self, size: usize) -> Result<u64> {
        (**self).allocate(size)
    }

    fn free(&self, addr: u64, size: usize) -> Result<()> {
        (**self).free(addr, size)
    }

    fn sync(
        &self,
        addr: u64,
        size: usize,
        direction: SyncDirection,
        phase: SyncPhase,
    ) -> Result<()> {
        (**self).sync(addr, size, direction, phase)
    }

    fn submit(
        &self,
        namespace: Option<&Namespace>,
        input: &[u8],
        output: &mut [u8],
        buffers: &[BufferEntry],
    ) -> Result<()> {
        (**self).submit(namespace, input, output, buffers)
    }

    fn statistics(&self, reset: bool) -> Result<KernelStatistics> {
        (**self).statistics(reset)
    }
}

fn ioctl_size(name: &str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid_argument!("{name} ({value}) does not fit in 32 bits"))
}

/// Channel backed by the XRP device node.
pub struct XrpChannel {
    file: File,
    path: PathBuf,
}

impl XrpChannel {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| {
                error!("failed to open device {}: {source}", path.display());
                Error::OpenDeviceFailed {
                    path: path.clone(),
                    source,
                }
            })?;
        debug!("opened DSP device {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Channel for XrpChannel {
    fn allocate(&self, size: usize) -> Result<u64> {
        let mut alloc = xrp_ioctl_alloc {
            size: ioctl_size("allocation size", size)?,
            align: ALLOCATION_ALIGNMENT,
            addr: 0,
        };
        unsafe { xrp_sys::xrp_alloc(self.file.as_raw_fd(), &mut alloc) }.map_err(|errno| {
            error!("failed to allocate buffer of {size} bytes: {errno}");
            Error::CreateBufferFailed {
                size,
                reason: errno.to_string(),
            }
        })?;
        Ok(alloc.addr)
    }

    fn free(&self, addr: u64, size: usize) -> Result<()> {
        let mut alloc = xrp_ioctl_alloc {
            size: ioctl_size("allocation size", size)?,
            align: 0,
            addr,
        };
        unsafe { xrp_sys::xrp_free(self.file.as_raw_fd(), &mut alloc) }.map_err(|errno| {
            error!("failed to free buffer {addr:#x}: {errno}");
            Error::UnmapBufferFailed(errno)
        })?;
        Ok(())
    }

    fn sync(
        &self,
        addr: u64,
        size: usize,
        direction: SyncDirection,
        phase: SyncPhase,
    ) -> Result<()> {
        let mut sync = xrp_ioctl_sync_buffer {
            direction: direction as u32,
            access_time: phase as u32,
            size: ioctl_size("sync size", size)?,
            addr,
        };
        unsafe { xrp_sys::xrp_dma_sync(self.file.as_raw_fd(), &mut sync) }.map_err(|errno| {
            error!("failed to sync buffer {addr:#x} ({direction:?}, {phase:?}): {errno}");
            Error::SyncBufferFailed(errno.to_string())
        })?;
        Ok(())
    }

    fn submit(
        &self,
        namespace: Option<&Namespace>,
        input: &[u8],
        output: &mut [u8],
        buffers: &[BufferEntry],
    ) -> Result<()> {
        let descriptors: Vec<xrp_ioctl_buffer> = buffers.iter().map(Into::into).collect();
        let mut queue = xrp_ioctl_queue {
            flags: if namespace.is_some() {
                xrp_sys::XRP_QUEUE_FLAG_NSID
            } else {
                0
            },
            in_data_size: ioctl_size("request size", input.len())?,
            out_data_size: ioctl_size("response size", output.len())?,
            buffer_size: ioctl_size(
                "buffer list size",
                descriptors.len() * size_of::<xrp_ioctl_buffer>(),
            )?,
            in_data_addr: input.as_ptr() as u64,
            out_data_addr: output.as_mut_ptr() as u64,
            buffer_addr: descriptors.as_ptr() as u64,
            nsid_addr: namespace.map_or(0, |ns| ns.as_bytes().as_ptr() as u64),
        };

        unsafe { xrp_sys::xrp_queue(self.file.as_raw_fd(), &mut queue) }.map_err(|errno| {
            error!(
                "failed to run command ({errno}), check the kernel log (dmesg) and the DSP firmware log ({})",
                xrp_sys::XRP_FIRMWARE_LOG_PATH
            );
            Error::RunCommandFailed(errno)
        })?;
        Ok(())
    }

    fn statistics(&self, reset: bool) -> Result<KernelStatistics> {
        let mut stats = xrp_ioctl_stats {
            reset: reset as u8,
            ..Default::default()
        };
        unsafe { xrp_sys::xrp_stats(self.file.as_raw_fd(), &mut stats) }.map_err(|errno| {
            error!("failed to gather kernel statistics: {errno}");
            Error::IoctlFailed(errno)
        })?;
        Ok(KernelStatistics {
            total_dsp_time: Duration::from_micros(stats.total_dsp_time_us),
            max_dsp_command_time: Duration::from_micros(stats.max_dsp_command_time_us),
            total_dsp_commands: stats.total_dsp_commands,
            current_threads_using_dsp: stats.current_threads_using_dsp,
            max_threads_using_dsp: stats.max_threads_using_dsp,
        })
    }
}

impl Drop for XrpChannel {
    fn drop(&mut self) {
        debug!("closed DSP device {}", self.path.display());
    }
}
