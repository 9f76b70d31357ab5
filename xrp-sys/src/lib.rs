// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Raw kernel interface of the XRP DSP driver (`/dev/xvp*`).
//!
//! The structures in this crate are shared with the kernel driver and must
//! keep their exact `#[repr(C)]` layout. No logic lives here; safe wrappers
//! are provided by the `dsp-imaging` crate.

#![allow(non_camel_case_types)]

use std::fmt;

use nix::{ioctl_readwrite_bad, request_code_none};

/// Default device node exposed by the driver.
pub const XRP_DEVICE_PATH: &str = "/dev/xvp0";

/// Firmware log exposed by the driver, referenced in diagnostics.
pub const XRP_FIRMWARE_LOG_PATH: &str = "/dev/xvp_log0";

pub const XRP_IOCTL_MAGIC: u8 = b'r';

/// Size of the namespace identifier pointed to by `xrp_ioctl_queue::nsid_addr`.
pub const XRP_NAMESPACE_ID_SIZE: usize = 16;

pub const XRP_FLAG_READ: u32 = 1 << 0;
pub const XRP_FLAG_WRITE: u32 = 1 << 1;
pub const XRP_FLAG_READ_WRITE: u32 = XRP_FLAG_READ | XRP_FLAG_WRITE;

pub const XRP_MEMORY_TYPE_USERPTR: u32 = 0;
pub const XRP_MEMORY_TYPE_DMABUF: u32 = 1;

/// `xrp_ioctl_queue::flags` bit set when `nsid_addr` is valid.
pub const XRP_QUEUE_FLAG_NSID: u32 = 1 << 2;

pub const XRP_SYNC_DIRECTION_READ: u32 = 1;
pub const XRP_SYNC_DIRECTION_WRITE: u32 = 2;
pub const XRP_SYNC_DIRECTION_BOTH: u32 = 3;

pub const XRP_FLAG_BUFFER_SYNC_START: u32 = 0;
pub const XRP_FLAG_BUFFER_SYNC_END: u32 = 1;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct xrp_ioctl_alloc {
    pub size: u32,
    pub align: u32,
    pub addr: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union xrp_ioctl_buffer_target {
    pub addr: u64,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct xrp_ioctl_buffer {
    pub flags: u32,
    pub size: u32,
    pub memory_type: u32,
    pub target: xrp_ioctl_buffer_target,
}

impl xrp_ioctl_buffer {
    pub fn userptr(flags: u32, size: u32, addr: u64) -> Self {
        Self {
            flags,
            size,
            memory_type: XRP_MEMORY_TYPE_USERPTR,
            target: xrp_ioctl_buffer_target { addr },
        }
    }

    pub fn dmabuf(flags: u32, size: u32, fd: i32) -> Self {
        // Zero the whole union first so the upper half of `addr` is defined.
        let mut target = xrp_ioctl_buffer_target { addr: 0 };
        target.fd = fd;
        Self {
            flags,
            size,
            memory_type: XRP_MEMORY_TYPE_DMABUF,
            target,
        }
    }
}

impl fmt::Debug for xrp_ioctl_buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("xrp_ioctl_buffer");
        s.field("flags", &self.flags)
            .field("size", &self.size)
            .field("memory_type", &self.memory_type);
        // SAFETY: `memory_type` selects the active union member.
        unsafe {
            if self.memory_type == XRP_MEMORY_TYPE_DMABUF {
                s.field("fd", &self.target.fd);
            } else {
                s.field("addr", &format_args!("{:#x}", self.target.addr));
            }
        }
        s.finish()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct xrp_ioctl_queue {
    pub flags: u32,
    pub in_data_size: u32,
    pub out_data_size: u32,
    pub buffer_size: u32,
    pub in_data_addr: u64,
    pub out_data_addr: u64,
    pub buffer_addr: u64,
    pub nsid_addr: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct xrp_ioctl_sync_buffer {
    pub direction: u32,
    pub access_time: u32,
    pub size: u32,
    pub addr: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct xrp_ioctl_stats {
    pub reset: u8,
    pub current_threads_using_dsp: u8,
    pub max_threads_using_dsp: u8,
    pub total_dsp_commands: u32,
    pub total_dsp_time_us: u64,
    pub max_dsp_command_time_us: u64,
}

const _: () = assert!(std::mem::size_of::<xrp_ioctl_alloc>() == 16);
const _: () = assert!(std::mem::size_of::<xrp_ioctl_buffer>() == 24);
const _: () = assert!(std::mem::size_of::<xrp_ioctl_queue>() == 48);
const _: () = assert!(std::mem::size_of::<xrp_ioctl_sync_buffer>() == 24);
const _: () = assert!(std::mem::size_of::<xrp_ioctl_stats>() == 24);

ioctl_readwrite_bad!(
    xrp_alloc,
    request_code_none!(XRP_IOCTL_MAGIC, 1),
    xrp_ioctl_alloc
);
ioctl_readwrite_bad!(
    xrp_free,
    request_code_none!(XRP_IOCTL_MAGIC, 2),
    xrp_ioctl_alloc
);
ioctl_readwrite_bad!(
    xrp_queue,
    request_code_none!(XRP_IOCTL_MAGIC, 3),
    xrp_ioctl_queue
);
ioctl_readwrite_bad!(
    xrp_dma_sync,
    request_code_none!(XRP_IOCTL_MAGIC, 5),
    xrp_ioctl_sync_buffer
);
ioctl_readwrite_bad!(
    xrp_stats,
    request_code_none!(XRP_IOCTL_MAGIC, 6),
    xrp_ioctl_stats
);
