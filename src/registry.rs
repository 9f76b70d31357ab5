// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    image::{Backing, BufferRef, Image, MemoryKind, Plane},
    wire::{DataPlane, WireImage},
};
use tracing::{error, trace};

/// How the accelerator touches a registered buffer.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read = xrp_sys::XRP_FLAG_READ,
    Write = xrp_sys::XRP_FLAG_WRITE,
    ReadWrite = xrp_sys::XRP_FLAG_READ_WRITE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferEntry {
    pub backing: Backing,
    pub size: u32,
    pub access: Access,
}

impl BufferEntry {
    pub fn memory_kind(&self) -> MemoryKind {
        self.backing.kind()
    }
}

impl From<&BufferEntry> for xrp_sys::xrp_ioctl_buffer {
    fn from(entry: &BufferEntry) -> Self {
        let flags = entry.access as u32;
        match entry.backing {
            Backing::UserPtr(addr) => Self::userptr(flags, entry.size, addr as u64),
            Backing::DmaBuf(fd) => Self::dmabuf(flags, entry.size, fd),
        }
    }
}

/// The buffers referenced by one command.
///
/// Indices are handed out in registration order starting at zero; the
/// accelerator finds plane data only through them.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    entries: Vec<BufferEntry>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a buffer and returns its index.
    pub fn register(&mut self, backing: Backing, size: usize, access: Access) -> Result<u32> {
        let size = u32::try_from(size).map_err(|_| {
            error!("buffer {backing} of {size} bytes is too large to register");
            Error::AddBufferGroupFailed(format!("buffer of {size} bytes is too large"))
        })?;
        let index = u32::try_from(self.entries.len())
            .map_err(|_| Error::AddBufferGroupFailed("buffer list is full".to_owned()))?;

        self.entries.try_reserve(1).map_err(|e| {
            error!("failed to grow the buffer list: {e}");
            Error::CreateBufferGroupFailed
        })?;
        self.entries.push(BufferEntry {
            backing,
            size,
            access,
        });
        trace!(index, %backing, size, ?access, "registered buffer");
        Ok(index)
    }

    pub fn register_buffer(&mut self, buffer: &BufferRef, access: Access) -> Result<u32> {
        self.register(buffer.backing, buffer.size, access)
    }

    /// Registers an auxiliary plane and returns its wire record.
    pub fn register_plane(&mut self, plane: &Plane, access: Access) -> Result<DataPlane> {
        Ok(DataPlane {
            buffer_index: self.register(plane.backing, plane.size, access)?,
            line_stride: crate::wire::to_u32("line stride", plane.stride)?,
            plane_size: crate::wire::to_u32("plane size", plane.size)?,
        })
    }

    /// Translates the image and registers its planes in order, storing each
    /// index in the matching wire plane.
    pub fn register_image(&mut self, image: &Image, access: Access) -> Result<WireImage> {
        let mut wire = WireImage::translate(image)?;
        for (dst, plane) in wire.planes.iter_mut().zip(&image.planes) {
            dst.buffer_index = self.register(plane.backing, plane.size, access)?;
        }
        Ok(wire)
    }

    pub fn entries(&self) -> &[BufferEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BufferEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Format;

    #[test]
    fn indices_follow_registration_order() {
        let mut registry = BufferRegistry::new();
        for k in 0..10u32 {
            let index = registry
                .register(Backing::UserPtr(0x1000 + k as usize), 16, Access::Read)
                .unwrap();
            assert_eq!(index, k);
        }
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn image_planes_are_registered_in_plane_order() {
        let mut registry = BufferRegistry::new();
        registry
            .register(Backing::UserPtr(0x100), 64, Access::Read)
            .unwrap();

        let image = Image::new(
            16,
            16,
            Format::Nv12,
            vec![
                Plane::new(Backing::DmaBuf(10), 16, 256),
                Plane::new(Backing::DmaBuf(11), 16, 128),
            ],
        );
        let wire = registry.register_image(&image, Access::Write).unwrap();
        assert_eq!(wire.buffer_indices(), vec![1, 2]);

        let entries = registry.entries();
        assert_eq!(entries[1].backing, Backing::DmaBuf(10));
        assert_eq!(entries[2].size, 128);
        assert_eq!(entries[2].access, Access::Write);
        assert_eq!(entries[2].memory_kind(), MemoryKind::DmaBuf);
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let mut registry = BufferRegistry::new();
        let err = registry
            .register(Backing::UserPtr(0x100), usize::MAX, Access::Read)
            .unwrap_err();
        assert!(matches!(err, Error::AddBufferGroupFailed(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn ioctl_descriptor_carries_access_and_kind() {
        let entry = BufferEntry {
            backing: Backing::UserPtr(0xdead_0000),
            size: 4096,
            access: Access::ReadWrite,
        };
        let buffer = xrp_sys::xrp_ioctl_buffer::from(&entry);
        assert_eq!(buffer.flags, 3);
        assert_eq!(buffer.size, 4096);
        assert_eq!(buffer.memory_type, xrp_sys::XRP_MEMORY_TYPE_USERPTR);
        assert_eq!(unsafe { buffer.target.addr }, 0xdead_0000);
    }
}
