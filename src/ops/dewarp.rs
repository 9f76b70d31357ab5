// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::resize::SMOOTH_INTERPOLATIONS;
use crate::{
    device::Device,
    dispatch::Command,
    error::{invalid_argument, Result},
    image::{DewarpMesh, Format, Image, Interpolation, Vsm, MESH_CELL_SIZE},
    registry::{Access, BufferRegistry},
    validate,
    wire::{
        to_u32, DataPlane, DewarpArgs, ImagingRequest, MotionState, PerfInfo, RotationDewarpArgs,
        RotationDewarpOutput, VsmArgs,
    },
};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct DewarpParams<'a> {
    pub src: &'a Image,
    pub dst: &'a Image,
    pub mesh: &'a DewarpMesh,
    pub interpolation: Interpolation,
}

fn validate_dewarp(params: &DewarpParams) -> Result<()> {
    validate::image("src", params.src)?;
    validate::image("dst", params.dst)?;
    validate::mesh(params.mesh, params.dst)?;
    validate::format("src", params.src, &[Format::Nv12])?;
    validate::format("dst", params.dst, &[Format::Nv12])?;
    validate::interpolation(params.interpolation, &SMOOTH_INTERPOLATIONS)
}

/// Registers the mesh table, then the source and destination planes.
fn marshal_dewarp(params: &DewarpParams, registry: &mut BufferRegistry) -> Result<DewarpArgs> {
    let mesh = params.mesh;
    let (Some(line_stride), Some(table_size)) = (mesh.line_stride(), mesh.table_size()) else {
        return Err(invalid_argument!(
            "{}x{} mesh table size overflows",
            mesh.mesh_width,
            mesh.mesh_height
        ));
    };
    let mesh_plane = DataPlane {
        buffer_index: registry.register(mesh.table, table_size, Access::Read)?,
        line_stride: to_u32("mesh line stride", line_stride)?,
        plane_size: to_u32("mesh size", table_size)?,
    };
    Ok(DewarpArgs {
        src: registry.register_image(params.src, Access::Read)?,
        dst: registry.register_image(params.dst, Access::Write)?,
        mesh: mesh_plane,
        mesh_width: to_u32("mesh width", mesh.mesh_width)?,
        mesh_height: to_u32("mesh height", mesh.mesh_height)?,
        mesh_sq_size: MESH_CELL_SIZE as u32,
        interpolation: params.interpolation as u8,
        _pad: [0; 3],
    })
}

/// Remaps an NV12 image through a mesh of Q16.16 source coordinates.
pub fn build_dewarp(params: &DewarpParams) -> Result<Command> {
    validate_dewarp(params)?;
    let mut registry = BufferRegistry::new();
    let args = marshal_dewarp(params, &mut registry)?;
    Ok(Command::new(ImagingRequest::Dewarp(args), registry))
}

/// Dewarp that also compensates camera rotation.
///
/// The firmware estimates motion from the stabilization sums and the IMU
/// angle delta, starting from `state`. Buffers are registered as mesh,
/// source, destination, row sums and column sums.
pub fn build_rotation_dewarp(
    params: &DewarpParams,
    vsm: &Vsm,
    imu_angle_delta: i32,
    state: MotionState,
) -> Result<Command> {
    validate_dewarp(params)?;
    validate::vsm(vsm, params.src)?;

    let mut registry = BufferRegistry::new();
    let dewarp = marshal_dewarp(params, &mut registry)?;
    let config = &vsm.config;
    let vsm_args = VsmArgs {
        hoffset: to_u32("vsm hoffset", config.hoffset)?,
        voffset: to_u32("vsm voffset", config.voffset)?,
        width: to_u32("vsm width", config.width)?,
        height: to_u32("vsm height", config.height)?,
        max_displacement: to_u32("vsm max displacement", config.max_displacement)?,
        rows: DataPlane {
            buffer_index: registry.register_buffer(&vsm.rows, Access::Read)?,
            line_stride: 0,
            plane_size: to_u32("vsm rows size", vsm.rows.size)?,
        },
        columns: DataPlane {
            buffer_index: registry.register_buffer(&vsm.columns, Access::Read)?,
            line_stride: 0,
            plane_size: to_u32("vsm columns size", vsm.columns.size)?,
        },
    };

    let args = RotationDewarpArgs {
        dewarp,
        vsm: vsm_args,
        imu_angle_delta,
        state,
    };
    Ok(Command::new(ImagingRequest::RotationDewarp(args), registry))
}

impl Device {
    pub fn dewarp(&self, params: &DewarpParams) -> Result<()> {
        self.run(&build_dewarp(params)?)
    }

    pub fn dewarp_perf(&self, params: &DewarpParams) -> Result<PerfInfo> {
        self.submit_perf(&build_dewarp(params)?)
    }

    /// Runs a rotation-compensated dewarp and replaces `state` with the
    /// motion estimate returned by the firmware.
    pub fn rotation_dewarp(
        &self,
        params: &DewarpParams,
        vsm: &Vsm,
        imu_angle_delta: i32,
        state: &mut MotionState,
    ) -> Result<()> {
        self.rotation_dewarp_perf(params, vsm, imu_angle_delta, state)
            .map(drop)
    }

    pub fn rotation_dewarp_perf(
        &self,
        params: &DewarpParams,
        vsm: &Vsm,
        imu_angle_delta: i32,
        state: &mut MotionState,
    ) -> Result<PerfInfo> {
        let command = build_rotation_dewarp(params, vsm, imu_angle_delta, *state)?;
        let output: RotationDewarpOutput = self.submit_for(&command)?;
        debug!(state = ?output.state, "motion state updated");
        *state = output.state;
        Ok(output.perf)
    }
}
