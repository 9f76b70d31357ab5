// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Caller-facing image, plane and region descriptors.
//!
//! Descriptors only describe memory; they never own it. The caller keeps the
//! backing buffers alive (and untouched by other threads) for the duration of
//! any command that references them.

use crate::error::{invalid_argument, Error};
use core::fmt;
use std::{os::fd::RawFd, str::FromStr};

/// Maximum number of planes a single image may carry.
pub const MAX_PLANES: usize = 4;

/// Output cell size, in pixels, of the dewarp mesh grid.
pub const MESH_CELL_SIZE: usize = 64;

/// Pixel formats understood by the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Grayscale, one plane, 8 bits per pixel.
    Gray8,
    /// Packed RGB, one plane, 8 bits per component.
    Rgb,
    /// Semi-planar 4:2:0 YUV: a Y plane followed by an interleaved UV plane.
    Nv12,
    /// Planar 4:2:0 YUV with alpha: Y, U, V and alpha planes in that order.
    A420,
}

/// Stride and payload size of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub stride: usize,
    pub size: usize,
}

const fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Gray8, Format::Rgb, Format::Nv12, Format::A420];

    pub fn planes_count(self) -> usize {
        match self {
            Format::Gray8 | Format::Rgb => 1,
            Format::Nv12 => 2,
            Format::A420 => 4,
        }
    }

    /// YUV 4:2:0 formats require even image dimensions.
    pub fn is_yuv420(self) -> bool {
        matches!(self, Format::Nv12 | Format::A420)
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Gray8 => "gray8",
            Format::Rgb => "rgb",
            Format::Nv12 => "nv12",
            Format::A420 => "a420",
        }
    }

    /// Reference plane layout used when allocating an image of this format.
    ///
    /// Line strides are rounded up to 4 bytes and chroma planes cover half
    /// of the (even-rounded) height.
    pub fn plane_layout(self, width: usize, height: usize) -> Vec<PlaneLayout> {
        let luma_stride = round_up(width, 4);
        let even_height = round_up(height, 2);
        match self {
            Format::Gray8 => vec![PlaneLayout {
                stride: luma_stride,
                size: luma_stride * height,
            }],
            Format::Rgb => {
                let stride = round_up(width * 3, 4);
                vec![PlaneLayout {
                    stride,
                    size: stride * height,
                }]
            }
            Format::Nv12 => vec![
                PlaneLayout {
                    stride: luma_stride,
                    size: luma_stride * even_height,
                },
                PlaneLayout {
                    stride: luma_stride,
                    size: luma_stride * even_height / 2,
                },
            ],
            Format::A420 => {
                let chroma_stride = round_up(round_up(width, 2) / 2, 4);
                let luma = PlaneLayout {
                    stride: luma_stride,
                    size: luma_stride * even_height,
                };
                let chroma = PlaneLayout {
                    stride: chroma_stride,
                    size: chroma_stride * even_height / 2,
                };
                vec![luma, chroma, chroma, luma]
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| invalid_argument!("unknown image format {s:?}"))
    }
}

impl TryFrom<u32> for Format {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Format::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| invalid_argument!("unknown image format {value}"))
    }
}

/// How plane memory is handed to the driver.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// A user-space virtual address.
    UserPtr = xrp_sys::XRP_MEMORY_TYPE_USERPTR,
    /// A DMA-buf file descriptor.
    DmaBuf = xrp_sys::XRP_MEMORY_TYPE_DMABUF,
}

/// Reference to the memory behind a plane or auxiliary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backing {
    /// User-space address of the first byte.
    UserPtr(usize),
    /// DMA-buf file descriptor.
    DmaBuf(RawFd),
}

impl Backing {
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Backing::UserPtr(ptr as usize)
    }

    pub fn kind(&self) -> MemoryKind {
        match self {
            Backing::UserPtr(_) => MemoryKind::UserPtr,
            Backing::DmaBuf(_) => MemoryKind::DmaBuf,
        }
    }

    pub fn is_null(&self) -> bool {
        match *self {
            Backing::UserPtr(addr) => addr == 0,
            Backing::DmaBuf(fd) => fd < 0,
        }
    }
}

impl fmt::Display for Backing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backing::UserPtr(addr) => write!(f, "ptr:{addr:#x}"),
            Backing::DmaBuf(fd) => write!(f, "fd:{fd}"),
        }
    }
}

/// One contiguous memory region of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub backing: Backing,
    /// Distance in bytes between the first pixels of two adjacent lines.
    pub stride: usize,
    /// Number of payload bytes in the plane.
    pub size: usize,
}

impl Plane {
    pub fn new(backing: Backing, stride: usize, size: usize) -> Self {
        Self {
            backing,
            stride,
            size,
        }
    }
}

/// Image geometry and plane memory, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub format: Format,
    pub memory: MemoryKind,
    pub planes: Vec<Plane>,
}

impl Image {
    /// Builds a descriptor whose memory kind is taken from the first plane.
    pub fn new(width: usize, height: usize, format: Format, planes: Vec<Plane>) -> Self {
        let memory = planes
            .first()
            .map(|plane| plane.backing.kind())
            .unwrap_or(MemoryKind::UserPtr);
        Self {
            width,
            height,
            format,
            memory,
            planes,
        }
    }

    /// The same image viewed through a crop box: dimensions shrink, planes
    /// stay untouched.
    pub fn cropped(&self, crop: &Roi) -> Image {
        Image {
            width: crop.width(),
            height: crop.height(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} planes:{}",
            self.width,
            self.height,
            self.format,
            self.planes.len()
        )
    }
}

/// Axis-aligned region with exclusive end coordinates.
///
/// Used for crop boxes, blur regions and privacy-mask regions alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roi {
    pub start_x: usize,
    pub start_y: usize,
    pub end_x: usize,
    pub end_y: usize,
}

impl Roi {
    pub fn new(start_x: usize, start_y: usize, end_x: usize, end_y: usize) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    /// Region covering a whole image.
    pub fn full(image: &Image) -> Self {
        Self::new(0, 0, image.width, image.height)
    }

    pub fn width(&self) -> usize {
        self.end_x.saturating_sub(self.start_x)
    }

    pub fn height(&self) -> usize {
        self.end_y.saturating_sub(self.start_y)
    }
}

/// Interpolation methods, with their wire encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    NearestNeighbor = 0,
    Bilinear = 1,
    Area = 2,
    Bicubic = 3,
}

impl Interpolation {
    pub const ALL: [Interpolation; 4] = [
        Interpolation::NearestNeighbor,
        Interpolation::Bilinear,
        Interpolation::Area,
        Interpolation::Bicubic,
    ];
}

impl TryFrom<u32> for Interpolation {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Interpolation::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| invalid_argument!("unknown interpolation type {value}"))
    }
}

/// Grid of source coordinates for the dewarp operation.
///
/// The table holds `mesh_width * mesh_height` vertices, each an `(x, y)` pair
/// of Q16.16 fixed-point `i32`s, mapping the corners of the
/// [`MESH_CELL_SIZE`]-pixel output cells back into the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DewarpMesh {
    pub mesh_width: usize,
    pub mesh_height: usize,
    pub table: Backing,
}

impl DewarpMesh {
    /// Bytes per row of vertices, or `None` if it overflows `usize`.
    pub fn line_stride(&self) -> Option<usize> {
        self.mesh_width.checked_mul(2 * std::mem::size_of::<i32>())
    }

    /// Bytes in the whole table, or `None` if it overflows `usize`.
    pub fn table_size(&self) -> Option<usize> {
        self.line_stride()?.checked_mul(self.mesh_height)
    }

    /// Smallest grid that covers an output image of the given size.
    pub fn minimum_size(width: usize, height: usize) -> (usize, usize) {
        (
            width.div_ceil(MESH_CELL_SIZE),
            height.div_ceil(MESH_CELL_SIZE),
        )
    }
}

/// An auxiliary buffer that is not part of any image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRef {
    pub backing: Backing,
    pub size: usize,
}

impl BufferRef {
    pub fn new(backing: Backing, size: usize) -> Self {
        Self { backing, size }
    }
}

/// An A420 image blended on top of a base image at the given offset.
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    pub image: &'a Image,
    pub x_offset: usize,
    pub y_offset: usize,
}

/// Side length, in source pixels, of one privacy-mask cell.
pub const PRIVACY_MASK_QUANTIZATION: usize = 4;

/// YUV fill color of masked cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskColor {
    pub y: u8,
    pub u: u8,
    pub v: u8,
}

/// Privacy mask applied to the source before cropping and resizing.
///
/// Region coordinates and the bitmask both live in the quantized space where
/// one unit covers [`PRIVACY_MASK_QUANTIZATION`]² source pixels. The bitmask
/// holds one bit per cell, `stride` bytes per quantized row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyMask {
    pub color: MaskColor,
    pub rois: Vec<Roi>,
    pub bitmask: Plane,
}

impl PrivacyMask {
    /// Quantized dimensions of an image of the given size.
    pub fn quantized_size(width: usize, height: usize) -> (usize, usize) {
        (
            width.div_ceil(PRIVACY_MASK_QUANTIZATION),
            height.div_ceil(PRIVACY_MASK_QUANTIZATION),
        )
    }
}

/// Video stabilization window used by the rotation-compensated dewarp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VsmConfig {
    pub hoffset: usize,
    pub voffset: usize,
    pub width: usize,
    pub height: usize,
    pub max_displacement: usize,
}

/// Stabilization window plus the per-row and per-column pixel sums computed
/// over it by the ISP, one `u32` per row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsm {
    pub config: VsmConfig,
    pub rows: BufferRef,
    pub columns: BufferRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_counts() {
        assert_eq!(Format::Gray8.planes_count(), 1);
        assert_eq!(Format::Rgb.planes_count(), 1);
        assert_eq!(Format::Nv12.planes_count(), 2);
        assert_eq!(Format::A420.planes_count(), 4);
    }

    #[test]
    fn nv12_reference_layout() {
        let layout = Format::Nv12.plane_layout(1920, 1080);
        assert_eq!(layout[0], PlaneLayout { stride: 1920, size: 1920 * 1080 });
        assert_eq!(layout[1], PlaneLayout { stride: 1920, size: 1920 * 540 });
    }

    #[test]
    fn a420_reference_layout_rounds_chroma_stride() {
        let layout = Format::A420.plane_layout(30, 20);
        assert_eq!(layout.len(), 4);
        assert_eq!(layout[0].stride, 32);
        assert_eq!(layout[1].stride, 16);
        assert_eq!(layout[1].size, 16 * 10);
        assert_eq!(layout[3], layout[0]);
    }

    #[test]
    fn format_codes() {
        assert_eq!(Format::try_from(2).unwrap(), Format::Nv12);
        assert!(Format::try_from(4).is_err());
        assert_eq!("NV12".parse::<Format>().unwrap(), Format::Nv12);
    }

    #[test]
    fn mesh_minimum_size_rounds_up() {
        assert_eq!(DewarpMesh::minimum_size(3840, 2160), (60, 34));
        assert_eq!(DewarpMesh::minimum_size(64, 65), (1, 2));
    }

    #[test]
    fn privacy_mask_quantization_rounds_up() {
        assert_eq!(PrivacyMask::quantized_size(1920, 1082), (480, 271));
    }

    #[test]
    fn cropped_view_keeps_planes() {
        let image = Image::new(
            64,
            64,
            Format::Gray8,
            vec![Plane::new(Backing::UserPtr(0x1000), 64, 4096)],
        );
        let cropped = image.cropped(&Roi::new(8, 8, 40, 24));
        assert_eq!((cropped.width, cropped.height), (32, 16));
        assert_eq!(cropped.planes, image.planes);
    }
}
