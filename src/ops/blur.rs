// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    device::Device,
    dispatch::Command,
    error::Result,
    image::{Format, Image, Roi},
    registry::{Access, BufferRegistry},
    validate,
    wire::{BlurArgs, ImagingRequest, PerfInfo, RoiArgs, MAX_BLUR_ROIS},
};
use bytemuck::Zeroable;

/// Box-blurs regions of a Gray8 or NV12 image in place.
pub fn build_blur(image: &Image, rois: &[Roi], kernel_size: usize) -> Result<Command> {
    validate::kernel_size(kernel_size)?;
    validate::capacity("blur rois", rois.len(), MAX_BLUR_ROIS)?;
    validate::image("image", image)?;
    validate::format("image", image, &[Format::Gray8, Format::Nv12])?;
    for (i, roi) in rois.iter().enumerate() {
        validate::roi(&format!("roi[{i}]"), roi, image.width, image.height)?;
    }

    let mut args = Box::new(BlurArgs::zeroed());
    args.kernel_size = kernel_size as u32;
    args.rois_count = rois.len() as u32;
    for (dst, roi) in args.rois.iter_mut().zip(rois) {
        *dst = RoiArgs::translate(roi)?;
    }

    let mut registry = BufferRegistry::new();
    args.image = registry.register_image(image, Access::ReadWrite)?;
    Ok(Command::new(ImagingRequest::Blur(args), registry))
}

impl Device {
    pub fn blur(&self, image: &Image, rois: &[Roi], kernel_size: usize) -> Result<()> {
        self.run(&build_blur(image, rois, kernel_size)?)
    }

    pub fn blur_perf(&self, image: &Image, rois: &[Roi], kernel_size: usize) -> Result<PerfInfo> {
        self.submit_perf(&build_blur(image, rois, kernel_size)?)
    }
}
