// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Imaging operations.
//!
//! Each operation has a `build_*` function that validates every input and
//! only then registers buffers and fills the wire arguments, returning a
//! [`Command`](crate::Command). The [`Device`](crate::Device) methods of the
//! same name submit that command; their `*_perf` forms also return the
//! firmware's [`PerfInfo`](crate::PerfInfo).

pub mod blend;
pub mod blur;
pub mod convert;
pub mod dewarp;
pub mod privacy;
pub mod resize;

pub use blend::build_blend;
pub use blur::build_blur;
pub use convert::build_convert_format;
pub use dewarp::{build_dewarp, build_rotation_dewarp, DewarpParams};
pub use privacy::build_multi_crop_and_resize_privacy_mask;
pub use resize::{
    build_crop_and_resize, build_multi_crop_and_resize, multi_outputs, MultiResizeParams,
    ResizeParams,
};
