// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    device::Device,
    dispatch::Command,
    error::Result,
    image::{Format, Image, Overlay},
    registry::{Access, BufferRegistry},
    validate,
    wire::{to_u32, BlendArgs, ImagingRequest, OverlayArgs, PerfInfo, MAX_BLEND_OVERLAYS},
};
use bytemuck::Zeroable;

/// Blends A420 overlays onto an NV12 image in place.
///
/// The image is registered read-write first, followed by the overlays in
/// order, read-only.
pub fn build_blend(image: &Image, overlays: &[Overlay]) -> Result<Command> {
    validate::capacity("overlays", overlays.len(), MAX_BLEND_OVERLAYS)?;
    validate::image("image", image)?;
    validate::format("image", image, &[Format::Nv12])?;
    for (i, overlay) in overlays.iter().enumerate() {
        let name = format!("overlays[{i}]");
        validate::image(&name, overlay.image)?;
        validate::format(&name, overlay.image, &[Format::A420])?;
        validate::placement(&name, image, overlay.image, overlay.x_offset, overlay.y_offset)?;
    }

    let mut registry = BufferRegistry::new();
    let mut args = Box::new(BlendArgs::zeroed());
    args.background = registry.register_image(image, Access::ReadWrite)?;
    args.overlays_count = overlays.len() as u32;
    for (dst, overlay) in args.overlays.iter_mut().zip(overlays) {
        *dst = OverlayArgs {
            overlay: registry.register_image(overlay.image, Access::Read)?,
            x_offset: to_u32("overlay x offset", overlay.x_offset)?,
            y_offset: to_u32("overlay y offset", overlay.y_offset)?,
        };
    }
    Ok(Command::new(ImagingRequest::Blend(args), registry))
}

impl Device {
    pub fn blend(&self, image: &Image, overlays: &[Overlay]) -> Result<()> {
        self.run(&build_blend(image, overlays)?)
    }

    pub fn blend_perf(&self, image: &Image, overlays: &[Overlay]) -> Result<PerfInfo> {
        self.submit_perf(&build_blend(image, overlays)?)
    }
}
