// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    channel::SyncDirection,
    device::Device,
    error::{invalid_argument, Error, Result},
    image::{Backing, Format, Image, MemoryKind, Plane},
};
use dma_buf::DmaBuf;
use dma_heap::{Heap, HeapKind};
use std::{
    error::Error as StdError,
    os::fd::{AsRawFd, OwnedFd},
    slice::{from_raw_parts, from_raw_parts_mut},
};
use tracing::{debug, error, warn};

/// A buffer allocated by the accelerator driver.
///
/// The buffer is returned to the driver when dropped. Call
/// [`DspBuffer::release`] instead to observe release failures.
pub struct DspBuffer<'d> {
    device: &'d Device,
    addr: u64,
    len: usize,
    released: bool,
}

impl<'d> DspBuffer<'d> {
    pub(crate) fn new(device: &'d Device, addr: u64, len: usize) -> Self {
        Self {
            device,
            addr,
            len,
            released: false,
        }
    }

    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub(crate) fn device(&self) -> &'d Device {
        self.device
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn backing(&self) -> Backing {
        Backing::UserPtr(self.addr as usize)
    }

    /// Describes this buffer as an image plane.
    pub fn plane(&self, stride: usize) -> Plane {
        Plane::new(self.backing(), stride, self.len)
    }

    /// CPU view of the buffer. Bracket accesses with
    /// [`sync_start`](Self::sync_start) and [`sync_end`](Self::sync_end).
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the driver mapped `len` bytes at `addr` into this process
        // and the mapping lives until the buffer is released.
        unsafe { from_raw_parts(self.addr as *const u8, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see `as_slice`; `&mut self` guarantees exclusive access.
        unsafe { from_raw_parts_mut(self.addr as *mut u8, self.len) }
    }

    pub fn sync_start(&self, direction: SyncDirection) -> Result<()> {
        self.device.sync_start(self.addr, direction)
    }

    pub fn sync_end(&self, direction: SyncDirection) -> Result<()> {
        self.device.sync_end(self.addr, direction)
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.device.free(self.addr)
    }
}

impl Drop for DspBuffer<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.device.free(self.addr) {
            warn!("failed to free DSP buffer {:#x}: {e}", self.addr);
        }
    }
}

/// An image whose planes are driver allocations, laid out with
/// [`Format::plane_layout`].
pub struct ImageBuffer<'d> {
    width: usize,
    height: usize,
    format: Format,
    planes: Vec<(DspBuffer<'d>, usize)>,
}

impl<'d> ImageBuffer<'d> {
    /// Allocates one buffer per plane. If any allocation fails, the planes
    /// already allocated are released before the error is returned.
    pub fn allocate(device: &'d Device, width: usize, height: usize, format: Format) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid_argument!("cannot allocate a {width}x{height} image"));
        }

        let layout = format.plane_layout(width, height);
        let mut planes = Vec::with_capacity(layout.len());
        for (index, plane) in layout.iter().enumerate() {
            match device.allocate_buffer(plane.size) {
                Ok(buffer) => planes.push((buffer, plane.stride)),
                Err(e) => {
                    error!("failed to allocate plane[{index}] of a {width}x{height} {format} image: {e}");
                    for (buffer, _) in planes.drain(..) {
                        if let Err(e) = buffer.release() {
                            warn!("failed to release partially allocated image: {e}");
                        }
                    }
                    return Err(e);
                }
            }
        }
        debug!("allocated {width}x{height} {format} image");
        Ok(Self {
            width,
            height,
            format,
            planes,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Descriptor referencing this buffer's planes.
    pub fn image(&self) -> Image {
        Image {
            width: self.width,
            height: self.height,
            format: self.format,
            memory: MemoryKind::UserPtr,
            planes: self
                .planes
                .iter()
                .map(|(buffer, stride)| buffer.plane(*stride))
                .collect(),
        }
    }

    pub fn planes(&self) -> impl Iterator<Item = &DspBuffer<'d>> {
        self.planes.iter().map(|(buffer, _)| buffer)
    }

    pub fn plane_mut(&mut self, index: usize) -> Option<&mut DspBuffer<'d>> {
        self.planes.get_mut(index).map(|(buffer, _)| buffer)
    }

    pub fn sync_start(&self, direction: SyncDirection) -> Result<()> {
        self.planes().try_for_each(|p| p.sync_start(direction))
    }

    pub fn sync_end(&self, direction: SyncDirection) -> Result<()> {
        self.planes().try_for_each(|p| p.sync_end(direction))
    }

    /// Releases every plane, reporting the first failure.
    pub fn release(self) -> Result<()> {
        let mut result = Ok(());
        for (buffer, _) in self.planes {
            if let Err(e) = buffer.release() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

struct DmaPlane {
    fd: OwnedFd,
    stride: usize,
    size: usize,
}

/// An image whose planes are DMA-buf allocations from the CMA heap.
///
/// DMA-buf planes are shared with the accelerator by file descriptor and are
/// freed when the image is dropped. CPU access goes through
/// [`read_plane`](Self::read_plane) and [`write_plane`](Self::write_plane),
/// which take care of cache synchronization.
pub struct DmaImage {
    width: usize,
    height: usize,
    format: Format,
    planes: Vec<DmaPlane>,
}

fn copy_out(data: &[u8], _: Option<()>) -> std::result::Result<Vec<u8>, Box<dyn StdError>> {
    Ok(data.to_vec())
}

fn copy_in(data: &mut [u8], src: Option<&[u8]>) -> std::result::Result<(), Box<dyn StdError>> {
    let src = src.unwrap_or_default();
    let data_len = data.len();
    let dst = data
        .get_mut(..src.len())
        .ok_or_else(|| format!("{} bytes do not fit a {} byte mapping", src.len(), data_len))?;
    dst.copy_from_slice(src);
    Ok(())
}

impl DmaImage {
    pub fn allocate(width: usize, height: usize, format: Format) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid_argument!("cannot allocate a {width}x{height} image"));
        }

        let heap = Heap::new(HeapKind::Cma).map_err(|e| {
            error!("failed to open the CMA heap: {e}");
            Error::CreateBufferFailed {
                size: 0,
                reason: e.to_string(),
            }
        })?;

        let mut planes = Vec::new();
        for layout in format.plane_layout(width, height) {
            let fd = heap.allocate(layout.size).map_err(|e| {
                error!("failed to allocate {} bytes from the CMA heap: {e}", layout.size);
                Error::CreateBufferFailed {
                    size: layout.size,
                    reason: e.to_string(),
                }
            })?;
            planes.push(DmaPlane {
                fd,
                stride: layout.stride,
                size: layout.size,
            });
        }
        debug!("allocated {width}x{height} {format} DMA image");
        Ok(Self {
            width,
            height,
            format,
            planes,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Descriptor referencing this image's file descriptors. It stays valid
    /// for as long as `self` is alive.
    pub fn image(&self) -> Image {
        Image {
            width: self.width,
            height: self.height,
            format: self.format,
            memory: MemoryKind::DmaBuf,
            planes: self
                .planes
                .iter()
                .map(|p| Plane::new(Backing::DmaBuf(p.fd.as_raw_fd()), p.stride, p.size))
                .collect(),
        }
    }

    fn plane(&self, index: usize) -> Result<&DmaPlane> {
        self.planes.get(index).ok_or_else(|| {
            invalid_argument!("plane[{index}] out of range for a {} image", self.format)
        })
    }

    fn dmabuf(&self, index: usize) -> Result<DmaBuf> {
        let plane = self.plane(index)?;
        let fd = plane.fd.try_clone().map_err(|e| {
            error!("failed to duplicate plane[{index}] descriptor: {e}");
            Error::MapBufferFailed(e.to_string())
        })?;
        Ok(DmaBuf::from(fd))
    }

    /// Copies a plane out, synchronizing the CPU cache around the access.
    pub fn read_plane(&self, index: usize) -> Result<Vec<u8>> {
        let mem = self.dmabuf(index)?.memory_map().map_err(|e| {
            error!("failed to map plane[{index}]: {e}");
            Error::MapBufferFailed(e.to_string())
        })?;
        mem.read(copy_out, None).map_err(|e| {
            error!("failed to read plane[{index}]: {e}");
            Error::SyncBufferFailed(e.to_string())
        })
    }

    /// Copies `data` into the start of a plane. Data longer than the plane
    /// is rejected before the plane is mapped.
    pub fn write_plane(&self, index: usize, data: &[u8]) -> Result<()> {
        let size = self.plane(index)?.size;
        if data.len() > size {
            return Err(invalid_argument!(
                "{} bytes do not fit plane[{index}] of {size} bytes",
                data.len()
            ));
        }
        let mut mem = self.dmabuf(index)?.memory_map().map_err(|e| {
            error!("failed to map plane[{index}]: {e}");
            Error::MapBufferFailed(e.to_string())
        })?;
        mem.write(copy_in, Some(data)).map_err(|e| {
            error!("failed to write plane[{index}]: {e}");
            Error::SyncBufferFailed(e.to_string())
        })
    }
}
