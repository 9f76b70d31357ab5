// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Request layout shared with the imaging firmware.
//!
//! Every structure here is `#[repr(C)]`, padding-free and [`Pod`], so a
//! request is serialized by copying its bytes. Field order and array
//! capacities are part of the firmware ABI; the size assertions at the bottom
//! of this module guard them.

use crate::{
    error::{invalid_argument, Result},
    image::{Format, Image, PlaneLayout, Roi, MAX_PLANES},
};
use bytemuck::{bytes_of, Pod, Zeroable};
use std::mem::size_of;

pub const MAX_BLEND_OVERLAYS: usize = 50;
pub const MAX_BLUR_ROIS: usize = 80;
pub const MAX_MULTI_RESIZE_OUTPUTS: usize = 7;
pub const MAX_PRIVACY_MASK_ROIS: usize = 8;

/// Operation codes, the discriminant of [`ImagingRequest`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CropResize = 0,
    Blend = 1,
    Blur = 2,
    ConvertFormat = 3,
    Dewarp = 4,
    MultiCropResize = 5,
    RotationDewarp = 6,
    MultiCropResizePrivacyMask = 7,
}

/// Format codes understood by the firmware, indexed by nothing but this
/// table. A format missing here cannot be sent.
const WIRE_FORMATS: [(Format, u32); 4] = [
    (Format::Gray8, 0),
    (Format::Rgb, 1),
    (Format::Nv12, 2),
    (Format::A420, 3),
];

pub fn format_code(format: Format) -> Result<u32> {
    WIRE_FORMATS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, code)| *code)
        .ok_or_else(|| invalid_argument!("format {format} has no wire encoding"))
}

pub fn format_from_code(code: u32) -> Result<Format> {
    WIRE_FORMATS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(f, _)| *f)
        .ok_or_else(|| invalid_argument!("unknown wire format code {code}"))
}

pub(crate) fn to_u32(name: &str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid_argument!("{name} ({value}) does not fit in 32 bits"))
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DataPlane {
    /// Index of the plane's buffer in the command's buffer list.
    pub buffer_index: u32,
    pub line_stride: u32,
    pub plane_size: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct WireImage {
    pub width: u32,
    pub height: u32,
    pub planes: [DataPlane; MAX_PLANES],
    pub planes_count: u32,
    pub format: u32,
}

impl WireImage {
    /// Copies geometry only. Buffer indices are filled in by the registry.
    pub fn translate(image: &Image) -> Result<Self> {
        if image.planes.len() > MAX_PLANES {
            return Err(invalid_argument!(
                "image has {} planes, at most {MAX_PLANES} are supported",
                image.planes.len()
            ));
        }

        let mut wire = WireImage {
            width: to_u32("width", image.width)?,
            height: to_u32("height", image.height)?,
            planes_count: image.planes.len() as u32,
            format: format_code(image.format)?,
            ..Default::default()
        };
        for (dst, src) in wire.planes.iter_mut().zip(&image.planes) {
            dst.line_stride = to_u32("line stride", src.stride)?;
            dst.plane_size = to_u32("plane size", src.size)?;
        }
        Ok(wire)
    }

    pub fn image_format(&self) -> Result<Format> {
        format_from_code(self.format)
    }

    /// Stride and size of each used plane.
    pub fn plane_layouts(&self) -> Vec<PlaneLayout> {
        self.planes
            .iter()
            .take(self.planes_count as usize)
            .map(|p| PlaneLayout {
                stride: p.line_stride as usize,
                size: p.plane_size as usize,
            })
            .collect()
    }

    pub fn buffer_indices(&self) -> Vec<u32> {
        self.planes
            .iter()
            .take(self.planes_count as usize)
            .map(|p| p.buffer_index)
            .collect()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RoiArgs {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl RoiArgs {
    pub fn translate(roi: &Roi) -> Result<Self> {
        Ok(Self {
            start_x: to_u32("start_x", roi.start_x)?,
            start_y: to_u32("start_y", roi.start_y)?,
            end_x: to_u32("end_x", roi.end_x)?,
            end_y: to_u32("end_y", roi.end_y)?,
        })
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CropResizeArgs {
    pub src: WireImage,
    pub dst: WireImage,
    pub crop: RoiArgs,
    pub interpolation: u8,
    pub _pad: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct MultiCropResizeArgs {
    pub src: WireImage,
    pub dst: [WireImage; MAX_MULTI_RESIZE_OUTPUTS],
    pub crop: RoiArgs,
    pub dst_count: u8,
    pub interpolation: u8,
    pub _pad: [u8; 2],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct OverlayArgs {
    pub overlay: WireImage,
    pub x_offset: u32,
    pub y_offset: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BlendArgs {
    pub background: WireImage,
    pub overlays: [OverlayArgs; MAX_BLEND_OVERLAYS],
    pub overlays_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BlurArgs {
    pub image: WireImage,
    pub rois: [RoiArgs; MAX_BLUR_ROIS],
    pub rois_count: u32,
    pub kernel_size: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ConvertFormatArgs {
    pub src: WireImage,
    pub dst: WireImage,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DewarpArgs {
    pub src: WireImage,
    pub dst: WireImage,
    pub mesh: DataPlane,
    pub mesh_width: u32,
    pub mesh_height: u32,
    pub mesh_sq_size: u32,
    pub interpolation: u8,
    pub _pad: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VsmArgs {
    pub hoffset: u32,
    pub voffset: u32,
    pub width: u32,
    pub height: u32,
    pub max_displacement: u32,
    /// Per-row sums, `height` entries.
    pub rows: DataPlane,
    /// Per-column sums, `width` entries.
    pub columns: DataPlane,
}

/// Accumulated camera motion, carried across rotation-dewarp calls.
///
/// The firmware returns the updated state in the command's output payload.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct MotionState {
    pub dx: i32,
    pub dy: i32,
    /// Q16.16 radians.
    pub angle: i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RotationDewarpArgs {
    pub dewarp: DewarpArgs,
    pub vsm: VsmArgs,
    /// Q16.16 radians reported by the IMU since the previous frame.
    pub imu_angle_delta: i32,
    pub state: MotionState,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PrivacyMaskArgs {
    pub bitmask: DataPlane,
    pub y: u8,
    pub u: u8,
    pub v: u8,
    pub _pad: u8,
    pub rois_count: u32,
    pub rois: [RoiArgs; MAX_PRIVACY_MASK_ROIS],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct MultiCropResizePrivacyMaskArgs {
    pub resize: MultiCropResizeArgs,
    pub privacy_mask: PrivacyMaskArgs,
}

/// Firmware timing counters returned by the `*_perf` operations.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PerfInfo {
    pub xrp_handler: u32,
    pub get_arg_params_context: u32,
    pub process_tiles_total: u32,
    pub process_tiles_setup: u32,
    pub kernel: u32,
    pub dma_wait: u32,
    pub setup_updates_tiles: u32,
    pub pad_edges: u32,
    pub ref_tile_setup: u32,
    pub in_dma_config: u32,
    pub out_dma_config: u32,
    pub tiles_count: u32,
}

/// Output payload of a rotation dewarp.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RotationDewarpOutput {
    pub state: MotionState,
    pub perf: PerfInfo,
}

/// Response of the utilization namespace.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct UtilizationResponse {
    pub utilization: u32,
}

/// One imaging request: the operation code plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagingRequest {
    CropResize(CropResizeArgs),
    Blend(Box<BlendArgs>),
    Blur(Box<BlurArgs>),
    ConvertFormat(ConvertFormatArgs),
    Dewarp(DewarpArgs),
    MultiCropResize(Box<MultiCropResizeArgs>),
    RotationDewarp(RotationDewarpArgs),
    MultiCropResizePrivacyMask(Box<MultiCropResizePrivacyMaskArgs>),
}

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Size of the largest argument structure.
pub const PAYLOAD_SIZE: usize = max(
    max(
        max(size_of::<CropResizeArgs>(), size_of::<BlendArgs>()),
        max(size_of::<BlurArgs>(), size_of::<ConvertFormatArgs>()),
    ),
    max(
        max(size_of::<DewarpArgs>(), size_of::<MultiCropResizeArgs>()),
        max(
            size_of::<RotationDewarpArgs>(),
            size_of::<MultiCropResizePrivacyMaskArgs>(),
        ),
    ),
);

/// Size of every encoded request, whatever its operation.
pub const REQUEST_SIZE: usize = size_of::<i32>() + PAYLOAD_SIZE;

impl ImagingRequest {
    pub fn operation(&self) -> Operation {
        match self {
            ImagingRequest::CropResize(_) => Operation::CropResize,
            ImagingRequest::Blend(_) => Operation::Blend,
            ImagingRequest::Blur(_) => Operation::Blur,
            ImagingRequest::ConvertFormat(_) => Operation::ConvertFormat,
            ImagingRequest::Dewarp(_) => Operation::Dewarp,
            ImagingRequest::MultiCropResize(_) => Operation::MultiCropResize,
            ImagingRequest::RotationDewarp(_) => Operation::RotationDewarp,
            ImagingRequest::MultiCropResizePrivacyMask(_) => Operation::MultiCropResizePrivacyMask,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            ImagingRequest::CropResize(args) => bytes_of(args),
            ImagingRequest::Blend(args) => bytes_of(args.as_ref()),
            ImagingRequest::Blur(args) => bytes_of(args.as_ref()),
            ImagingRequest::ConvertFormat(args) => bytes_of(args),
            ImagingRequest::Dewarp(args) => bytes_of(args),
            ImagingRequest::MultiCropResize(args) => bytes_of(args.as_ref()),
            ImagingRequest::RotationDewarp(args) => bytes_of(args),
            ImagingRequest::MultiCropResizePrivacyMask(args) => bytes_of(args.as_ref()),
        }
    }

    /// Serializes to exactly [`REQUEST_SIZE`] bytes: the operation code
    /// followed by the arguments, zero-filled up to the largest variant.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; REQUEST_SIZE];
        let (op, payload) = buf.split_at_mut(size_of::<i32>());
        op.copy_from_slice(&(self.operation() as i32).to_ne_bytes());
        let args = self.payload();
        payload[..args.len()].copy_from_slice(args);
        buf
    }
}

const _: () = assert!(size_of::<DataPlane>() == 12);
const _: () = assert!(size_of::<WireImage>() == 64);
const _: () = assert!(size_of::<RoiArgs>() == 16);
const _: () = assert!(size_of::<CropResizeArgs>() == 148);
const _: () = assert!(size_of::<MultiCropResizeArgs>() == 532);
const _: () = assert!(size_of::<OverlayArgs>() == 72);
const _: () = assert!(size_of::<BlendArgs>() == 3668);
const _: () = assert!(size_of::<BlurArgs>() == 1352);
const _: () = assert!(size_of::<ConvertFormatArgs>() == 128);
const _: () = assert!(size_of::<DewarpArgs>() == 156);
const _: () = assert!(size_of::<VsmArgs>() == 44);
const _: () = assert!(size_of::<RotationDewarpArgs>() == 216);
const _: () = assert!(size_of::<PrivacyMaskArgs>() == 148);
const _: () = assert!(size_of::<MultiCropResizePrivacyMaskArgs>() == 680);
const _: () = assert!(size_of::<PerfInfo>() == 48);
const _: () = assert!(REQUEST_SIZE == 3672);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Backing, Interpolation, Plane};

    #[test]
    fn wire_format_table() {
        for format in Format::ALL {
            let code = format_code(format).unwrap();
            assert_eq!(format_from_code(code).unwrap(), format);
        }
        assert!(format_from_code(4).is_err());
    }

    #[test]
    fn translate_copies_geometry_only() {
        let image = Image::new(
            64,
            32,
            Format::Nv12,
            vec![
                Plane::new(Backing::UserPtr(0x1000), 64, 2048),
                Plane::new(Backing::UserPtr(0x2000), 64, 1024),
            ],
        );
        let wire = WireImage::translate(&image).unwrap();
        assert_eq!((wire.width, wire.height), (64, 32));
        assert_eq!(wire.planes_count, 2);
        assert_eq!(wire.format, 2);
        assert_eq!(wire.buffer_indices(), vec![0, 0]);
        assert_eq!(wire.planes[2], DataPlane::default());
        assert_eq!(
            wire.plane_layouts(),
            vec![
                PlaneLayout {
                    stride: 64,
                    size: 2048
                },
                PlaneLayout {
                    stride: 64,
                    size: 1024
                },
            ]
        );
    }

    #[test]
    fn translate_is_lossless_for_every_format() -> Result<()> {
        for format in Format::ALL {
            for (width, height) in [(2, 2), (642, 480), (1920, 1080)] {
                let layout = format.plane_layout(width, height);
                let planes = layout
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Plane::new(Backing::UserPtr(0x1000 * (i + 1)), p.stride, p.size))
                    .collect();
                let image = Image::new(width, height, format, planes);

                let wire = WireImage::translate(&image)?;
                assert_eq!((wire.width as usize, wire.height as usize), (width, height));
                assert_eq!(wire.image_format()?, format);
                assert_eq!(wire.planes_count as usize, format.planes_count());
                assert_eq!(wire.plane_layouts(), layout);
                assert!(wire.planes[layout.len()..]
                    .iter()
                    .all(|p| *p == DataPlane::default()));
            }
        }
        Ok(())
    }

    #[test]
    fn translate_rejects_too_many_planes() {
        let plane = Plane::new(Backing::UserPtr(0x1000), 16, 256);
        let image = Image::new(16, 16, Format::Gray8, vec![plane; 5]);
        assert!(WireImage::translate(&image).is_err());
    }

    #[test]
    fn encode_is_fixed_size() {
        let request = ImagingRequest::ConvertFormat(ConvertFormatArgs::default());
        let bytes = request.encode();
        assert_eq!(bytes.len(), REQUEST_SIZE);
        assert_eq!(&bytes[..4], &3i32.to_ne_bytes());
        assert!(bytes[4..].iter().all(|b| *b == 0));

        let blend = ImagingRequest::Blend(Box::new(BlendArgs::zeroed()));
        assert_eq!(blend.encode().len(), REQUEST_SIZE);
    }

    #[test]
    fn encode_places_arguments_after_operation() {
        let args = CropResizeArgs {
            interpolation: Interpolation::Bicubic as u8,
            crop: RoiArgs {
                start_x: 1,
                start_y: 2,
                end_x: 3,
                end_y: 4,
            },
            ..Default::default()
        };
        let bytes = ImagingRequest::CropResize(args).encode();
        assert_eq!(&bytes[..4], &0i32.to_ne_bytes());
        let decoded: CropResizeArgs =
            bytemuck::pod_read_unaligned(&bytes[4..4 + size_of::<CropResizeArgs>()]);
        assert_eq!(decoded, args);
    }
}
