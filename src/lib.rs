// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # DSP Imaging Library
//!
//! This library marshals image-processing requests for a Vision DSP
//! accelerator reached through the XRP kernel driver. It validates image and
//! region descriptors, translates them into the fixed binary layout the
//! firmware expects, registers every referenced memory region in a
//! per-request buffer list, and submits the result synchronously.
//!
//! ## Features
//!
//! - **Validation**: Every request is checked in full before any buffer is
//!   registered, so rejected requests never reach the driver.
//! - **Imaging Operations**: Crop and resize with one or many outputs,
//!   privacy masking, overlay blending, box blur, RGB/NV12 conversion, mesh
//!   dewarp and rotation-compensated dewarp.
//! - **Buffer Lifecycle**: Contiguous driver allocations with explicit cache
//!   synchronization, plus DMA-buf images from the CMA heap.
//! - **Statistics**: Kernel driver counters and firmware utilization.
//!
//! ## Example
//!
//! ```no_run
//! use dsp_imaging::{
//!     ops::ResizeParams, Device, Format, ImageBuffer, Interpolation, SyncDirection,
//! };
//!
//! # fn main() -> Result<(), dsp_imaging::Error> {
//! let device = Device::open()?;
//!
//! let src = ImageBuffer::allocate(&device, 1920, 1080, Format::Nv12)?;
//! let dst = ImageBuffer::allocate(&device, 640, 360, Format::Nv12)?;
//!
//! let perf = device.resize_perf(&ResizeParams {
//!     src: &src.image(),
//!     dst: &dst.image(),
//!     interpolation: Interpolation::Bilinear,
//! })?;
//! println!("resize took {} cycles", perf.xrp_handler);
//!
//! dst.sync_start(SyncDirection::Read)?;
//! let luma = dst.planes().next().map(|p| p.as_slice()[0]);
//! dst.sync_end(SyncDirection::Read)?;
//! println!("first luma sample {luma:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux** with the XRP driver exposing `/dev/xvp0`
//! - **DMA heap** support (`/dev/dma_heap/linux,cma`) for [`DmaImage`]
//!
//! ## Safety
//!
//! This library uses `unsafe` code for the driver ioctls and for CPU access
//! to accelerator memory. All unsafe operations are isolated to the
//! `channel` and `buffer` modules and wrapped with safe APIs.

pub mod buffer;
pub mod channel;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod ops;
pub mod registry;
pub mod stats;
pub mod validate;
pub mod wire;

pub use buffer::{DmaImage, DspBuffer, ImageBuffer};
pub use channel::{Channel, Namespace, SyncDirection, SyncPhase, XrpChannel};
pub use device::{Device, DeviceConfig};
pub use dispatch::Command;
pub use error::{Error, Result, Status};
pub use image::{
    Backing, BufferRef, DewarpMesh, Format, Image, Interpolation, MaskColor, MemoryKind, Overlay,
    Plane, PrivacyMask, Roi, Vsm, VsmConfig,
};
pub use registry::{Access, BufferEntry, BufferRegistry};
pub use stats::KernelStatistics;
pub use wire::{ImagingRequest, MotionState, Operation, PerfInfo, REQUEST_SIZE};
