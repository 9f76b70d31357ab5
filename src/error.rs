// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use nix::errno::Errno;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Status codes shared with applications built against the DSP imaging API.
///
/// The numeric values are part of the public contract and never change.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success = 0,
    Uninitialized = 1,
    InvalidArgument = 2,
    OutOfHostMemory = 3,
    OpenDeviceFailed = 4,
    CreateQueueFailed = 5,
    CreateBufferFailed = 6,
    CreateBufferGroupFailed = 7,
    AddBufferGroupFailed = 8,
    RunCommandFailed = 9,
    MapBufferFailed = 10,
    UnmapBufferFailed = 11,
    SyncBufferFailed = 12,
    IoctlFailed = 13,
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("operation status was never initialized")]
    Uninitialized,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of host memory")]
    OutOfHostMemory,

    #[error("failed to open device {path:?}: {source}")]
    OpenDeviceFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create command queue: {0}")]
    CreateQueueFailed(Errno),

    #[error("failed to allocate buffer of {size} bytes: {reason}")]
    CreateBufferFailed { size: usize, reason: String },

    #[error("failed to create buffer list")]
    CreateBufferGroupFailed,

    #[error("failed to add buffer to buffer list: {0}")]
    AddBufferGroupFailed(String),

    /// The accelerator round-trip failed. The driver does not report why;
    /// the kernel log and the DSP firmware log hold the details.
    #[error(
        "failed to run command ({0}), check the kernel log (dmesg) and the DSP firmware log ({log})",
        log = xrp_sys::XRP_FIRMWARE_LOG_PATH
    )]
    RunCommandFailed(Errno),

    #[error("failed to map buffer: {0}")]
    MapBufferFailed(String),

    #[error("failed to unmap buffer: {0}")]
    UnmapBufferFailed(Errno),

    #[error("failed to sync buffer: {0}")]
    SyncBufferFailed(String),

    #[error("ioctl failed: {0}")]
    IoctlFailed(Errno),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Error::Uninitialized => Status::Uninitialized,
            Error::InvalidArgument(_) => Status::InvalidArgument,
            Error::OutOfHostMemory => Status::OutOfHostMemory,
            Error::OpenDeviceFailed { .. } => Status::OpenDeviceFailed,
            Error::CreateQueueFailed(_) => Status::CreateQueueFailed,
            Error::CreateBufferFailed { .. } => Status::CreateBufferFailed,
            Error::CreateBufferGroupFailed => Status::CreateBufferGroupFailed,
            Error::AddBufferGroupFailed(_) => Status::AddBufferGroupFailed,
            Error::RunCommandFailed(_) => Status::RunCommandFailed,
            Error::MapBufferFailed(_) => Status::MapBufferFailed,
            Error::UnmapBufferFailed(_) => Status::UnmapBufferFailed,
            Error::SyncBufferFailed(_) => Status::SyncBufferFailed,
            Error::IoctlFailed(_) => Status::IoctlFailed,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Logs the formatted message and builds an [`Error::InvalidArgument`] from it.
macro_rules! invalid_argument {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::error!("{}", msg);
        $crate::error::Error::InvalidArgument(msg)
    }};
}

pub(crate) use invalid_argument;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(Status::Success as i32, 0);
        assert_eq!(Status::InvalidArgument as i32, 2);
        assert_eq!(Status::RunCommandFailed as i32, 9);
        assert_eq!(Status::UnmapBufferFailed as i32, 11);
        assert_eq!(Status::IoctlFailed as i32, 13);
    }

    #[test]
    fn status_from_result() {
        let ok: Result<()> = Ok(());
        assert_eq!(Status::from(&ok), Status::Success);

        let err: Result<()> = Err(Error::RunCommandFailed(Errno::EIO));
        assert_eq!(Status::from(&err), Status::RunCommandFailed);
    }
}
