// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    channel::Namespace,
    device::Device,
    error::Result,
    registry::{BufferEntry, BufferRegistry},
    wire::{ImagingRequest, PerfInfo},
};
use bytemuck::{bytes_of_mut, Pod};
use tracing::{debug, error, instrument};

/// A fully marshaled request together with the buffers it references.
#[derive(Debug, Clone)]
pub struct Command {
    pub request: ImagingRequest,
    pub buffers: Vec<BufferEntry>,
}

impl Command {
    pub fn new(request: ImagingRequest, registry: BufferRegistry) -> Self {
        Self {
            request,
            buffers: registry.into_entries(),
        }
    }
}

impl Device {
    /// Sends `command` to the imaging namespace and blocks until the
    /// accelerator answers. `output` receives the response payload.
    ///
    /// A failed round trip is reported as
    /// [`Error::RunCommandFailed`](crate::Error::RunCommandFailed) and never
    /// retried.
    #[instrument(skip_all, fields(operation = ?command.request.operation()))]
    pub fn submit(&self, command: &Command, output: &mut [u8]) -> Result<()> {
        let input = command.request.encode();
        debug!(
            buffers = command.buffers.len(),
            request = input.len(),
            response = output.len(),
            "submitting command"
        );
        self.submit_raw(Some(self.namespace()), &input, output, &command.buffers)
            .inspect_err(|e| error!("{:?} failed: {e}", command.request.operation()))
    }

    /// Submits a command that expects no response payload.
    pub fn run(&self, command: &Command) -> Result<()> {
        self.submit(command, &mut [])
    }

    /// Submits and decodes a fixed-size response.
    pub fn submit_for<T: Pod>(&self, command: &Command) -> Result<T> {
        let mut response = T::zeroed();
        self.submit(command, bytes_of_mut(&mut response))?;
        Ok(response)
    }

    /// Submits and returns the firmware's performance counters.
    pub fn submit_perf(&self, command: &Command) -> Result<PerfInfo> {
        self.submit_for(command)
    }

    pub(crate) fn submit_raw(
        &self,
        namespace: Option<&Namespace>,
        input: &[u8],
        output: &mut [u8],
        buffers: &[BufferEntry],
    ) -> Result<()> {
        self.channel().submit(namespace, input, output, buffers)
    }
}
