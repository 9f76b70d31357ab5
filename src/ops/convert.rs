// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    device::Device,
    dispatch::Command,
    error::{invalid_argument, Result},
    image::{Format, Image},
    registry::{Access, BufferRegistry},
    validate,
    wire::{ConvertFormatArgs, ImagingRequest, PerfInfo},
};

const CONVERSIONS: [(Format, Format); 2] = [(Format::Rgb, Format::Nv12), (Format::Nv12, Format::Rgb)];

/// Converts between RGB and NV12 without scaling.
pub fn build_convert_format(src: &Image, dst: &Image) -> Result<Command> {
    validate::image("src", src)?;
    validate::image("dst", dst)?;
    if !CONVERSIONS.contains(&(src.format, dst.format)) {
        return Err(invalid_argument!(
            "conversion from {} to {} is not supported",
            src.format,
            dst.format
        ));
    }
    validate::same_size(src, dst)?;

    let mut registry = BufferRegistry::new();
    let args = ConvertFormatArgs {
        src: registry.register_image(src, Access::Read)?,
        dst: registry.register_image(dst, Access::Write)?,
    };
    Ok(Command::new(ImagingRequest::ConvertFormat(args), registry))
}

impl Device {
    pub fn convert_format(&self, src: &Image, dst: &Image) -> Result<()> {
        self.run(&build_convert_format(src, dst)?)
    }

    pub fn convert_format_perf(&self, src: &Image, dst: &Image) -> Result<PerfInfo> {
        self.submit_perf(&build_convert_format(src, dst)?)
    }
}
