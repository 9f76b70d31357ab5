// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::resize::{marshal_multi, validate_multi, MultiResizeParams};
use crate::{
    device::Device,
    dispatch::Command,
    error::Result,
    image::{PrivacyMask, Roi},
    registry::{Access, BufferRegistry},
    validate,
    wire::{
        ImagingRequest, MultiCropResizePrivacyMaskArgs, PerfInfo, PrivacyMaskArgs, RoiArgs,
        MAX_PRIVACY_MASK_ROIS,
    },
};

/// Multi-output resize with a privacy mask painted over the source first.
///
/// Buffers are registered as source, destinations, then the mask bitmask.
pub fn build_multi_crop_and_resize_privacy_mask(
    params: &MultiResizeParams,
    crop: &Roi,
    mask: &PrivacyMask,
) -> Result<Command> {
    validate_multi(params, crop)?;
    validate::privacy_mask(mask, params.src, MAX_PRIVACY_MASK_ROIS)?;

    let mut privacy_mask = PrivacyMaskArgs {
        y: mask.color.y,
        u: mask.color.u,
        v: mask.color.v,
        rois_count: mask.rois.len() as u32,
        ..Default::default()
    };
    for (dst, roi) in privacy_mask.rois.iter_mut().zip(&mask.rois) {
        *dst = RoiArgs::translate(roi)?;
    }

    let mut registry = BufferRegistry::new();
    let resize = marshal_multi(params, crop, &mut registry)?;
    privacy_mask.bitmask = registry.register_plane(&mask.bitmask, Access::Read)?;

    Ok(Command::new(
        ImagingRequest::MultiCropResizePrivacyMask(Box::new(MultiCropResizePrivacyMaskArgs {
            resize,
            privacy_mask,
        })),
        registry,
    ))
}

impl Device {
    pub fn multi_crop_and_resize_privacy_mask(
        &self,
        params: &MultiResizeParams,
        crop: &Roi,
        mask: &PrivacyMask,
    ) -> Result<()> {
        self.run(&build_multi_crop_and_resize_privacy_mask(params, crop, mask)?)
    }

    pub fn multi_crop_and_resize_privacy_mask_perf(
        &self,
        params: &MultiResizeParams,
        crop: &Roi,
        mask: &PrivacyMask,
    ) -> Result<PerfInfo> {
        self.submit_perf(&build_multi_crop_and_resize_privacy_mask(
            params, crop, mask,
        )?)
    }
}
