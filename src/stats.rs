// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    channel::Namespace,
    device::Device,
    error::Result,
    wire::UtilizationResponse,
};
use bytemuck::{bytes_of_mut, Zeroable};
use std::time::Duration;
use tracing::debug;

/// Counters accumulated by the kernel driver across all processes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KernelStatistics {
    pub total_dsp_time: Duration,
    pub max_dsp_command_time: Duration,
    pub total_dsp_commands: u32,
    pub current_threads_using_dsp: u8,
    pub max_threads_using_dsp: u8,
}

impl KernelStatistics {
    /// Mean accelerator time per command.
    pub fn average_command_time(&self) -> Option<Duration> {
        (self.total_dsp_commands > 0).then(|| self.total_dsp_time / self.total_dsp_commands)
    }
}

impl Device {
    pub fn kernel_statistics(&self) -> Result<KernelStatistics> {
        self.channel().statistics(false)
    }

    pub fn reset_kernel_statistics(&self) -> Result<()> {
        self.channel().statistics(true)?;
        debug!("kernel statistics reset");
        Ok(())
    }

    /// DSP load in percent, as measured by the firmware.
    pub fn utilization(&self) -> Result<u32> {
        let mut response = UtilizationResponse::zeroed();
        self.submit_raw(
            Some(&Namespace::UTILIZATION),
            &[],
            bytes_of_mut(&mut response),
            &[],
        )?;
        Ok(response.utilization)
    }
}
