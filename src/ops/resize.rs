// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    device::Device,
    dispatch::Command,
    error::Result,
    image::{Format, Image, Interpolation, Roi},
    registry::{Access, BufferRegistry},
    validate,
    wire::{
        CropResizeArgs, ImagingRequest, MultiCropResizeArgs, PerfInfo, RoiArgs, WireImage,
        MAX_MULTI_RESIZE_OUTPUTS,
    },
};
use bytemuck::Zeroable;

const RESIZE_FORMATS: [Format; 3] = [Format::Gray8, Format::Rgb, Format::Nv12];

pub(crate) const SMOOTH_INTERPOLATIONS: [Interpolation; 2] =
    [Interpolation::Bilinear, Interpolation::Bicubic];

#[derive(Debug, Clone, Copy)]
pub struct ResizeParams<'a> {
    pub src: &'a Image,
    pub dst: &'a Image,
    pub interpolation: Interpolation,
}

/// Validates and marshals a crop followed by a resize into `dst`.
///
/// `src` and `dst` share one of Gray8, RGB or NV12. Area interpolation
/// requires `dst` to be no larger than the crop box.
pub fn build_crop_and_resize(params: &ResizeParams, crop: &Roi) -> Result<Command> {
    let ResizeParams {
        src,
        dst,
        interpolation,
    } = *params;

    validate::image("src", src)?;
    validate::crop(src, crop)?;
    validate::image("dst", dst)?;
    validate::same_format(src, dst)?;
    validate::format("src", src, &RESIZE_FORMATS)?;
    validate::scaling(interpolation, crop.width(), crop.height(), dst)?;
    let crop_args = RoiArgs::translate(crop)?;

    let mut registry = BufferRegistry::new();
    let args = CropResizeArgs {
        src: registry.register_image(src, Access::Read)?,
        dst: registry.register_image(dst, Access::Write)?,
        crop: crop_args,
        interpolation: interpolation as u8,
        _pad: [0; 3],
    };
    Ok(Command::new(ImagingRequest::CropResize(args), registry))
}

/// Multi-output resize: one NV12 source cropped once and scaled into up to
/// seven NV12 destinations. `None` slots are skipped.
#[derive(Debug, Clone, Copy)]
pub struct MultiResizeParams<'a> {
    pub src: &'a Image,
    pub dst: &'a [Option<&'a Image>],
    pub interpolation: Interpolation,
}

impl MultiResizeParams<'_> {
    pub fn outputs(&self) -> impl Iterator<Item = &Image> + '_ {
        self.dst.iter().flatten().copied()
    }
}

pub(crate) fn validate_multi(params: &MultiResizeParams, crop: &Roi) -> Result<()> {
    validate::capacity(
        "multi-resize outputs",
        params.outputs().count(),
        MAX_MULTI_RESIZE_OUTPUTS,
    )?;
    validate::image("src", params.src)?;
    validate::crop(params.src, crop)?;
    validate::format("src", params.src, &[Format::Nv12])?;
    for (i, dst) in params.dst.iter().enumerate() {
        let Some(dst) = dst else { continue };
        let name = format!("dst[{i}]");
        validate::image(&name, dst)?;
        validate::format(&name, dst, &[Format::Nv12])?;
    }
    validate::interpolation(params.interpolation, &SMOOTH_INTERPOLATIONS)
}

/// Registers the source and every present destination, in that order.
pub(crate) fn marshal_multi(
    params: &MultiResizeParams,
    crop: &Roi,
    registry: &mut BufferRegistry,
) -> Result<MultiCropResizeArgs> {
    let mut args = MultiCropResizeArgs::zeroed();
    args.crop = RoiArgs::translate(crop)?;
    args.interpolation = params.interpolation as u8;
    args.src = registry.register_image(params.src, Access::Read)?;

    let mut count = 0;
    for (slot, dst) in args.dst.iter_mut().zip(params.outputs()) {
        *slot = registry.register_image(dst, Access::Write)?;
        count += 1;
    }
    args.dst_count = count;
    Ok(args)
}

pub fn build_multi_crop_and_resize(params: &MultiResizeParams, crop: &Roi) -> Result<Command> {
    validate_multi(params, crop)?;
    let mut registry = BufferRegistry::new();
    let args = marshal_multi(params, crop, &mut registry)?;
    Ok(Command::new(
        ImagingRequest::MultiCropResize(Box::new(args)),
        registry,
    ))
}

impl Device {
    pub fn crop_and_resize(&self, params: &ResizeParams, crop: &Roi) -> Result<()> {
        self.run(&build_crop_and_resize(params, crop)?)
    }

    pub fn crop_and_resize_perf(&self, params: &ResizeParams, crop: &Roi) -> Result<PerfInfo> {
        self.submit_perf(&build_crop_and_resize(params, crop)?)
    }

    /// Resizes the whole source into `dst`.
    pub fn resize(&self, params: &ResizeParams) -> Result<()> {
        self.crop_and_resize(params, &Roi::full(params.src))
    }

    pub fn resize_perf(&self, params: &ResizeParams) -> Result<PerfInfo> {
        self.crop_and_resize_perf(params, &Roi::full(params.src))
    }

    pub fn multi_crop_and_resize(&self, params: &MultiResizeParams, crop: &Roi) -> Result<()> {
        self.run(&build_multi_crop_and_resize(params, crop)?)
    }

    pub fn multi_crop_and_resize_perf(
        &self,
        params: &MultiResizeParams,
        crop: &Roi,
    ) -> Result<PerfInfo> {
        self.submit_perf(&build_multi_crop_and_resize(params, crop)?)
    }
}

/// Present destinations of a marshaled multi-resize, in slot order.
pub fn multi_outputs(args: &MultiCropResizeArgs) -> &[WireImage] {
    &args.dst[..(args.dst_count as usize).min(MAX_MULTI_RESIZE_OUTPUTS)]
}
