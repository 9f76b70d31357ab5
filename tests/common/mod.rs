// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

#![allow(dead_code)]

use dsp_imaging::{
    Backing, BufferEntry, Channel, Device, Error, Format, Image, KernelStatistics, Namespace,
    Plane, Result, SyncDirection, SyncPhase,
};
use nix::errno::Errno;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
};

/// A command as seen by the driver.
#[derive(Debug, Clone)]
pub struct Submission {
    pub namespace: Option<Namespace>,
    pub input: Vec<u8>,
    pub output_len: usize,
    pub buffers: Vec<BufferEntry>,
}

impl Submission {
    /// Operation code at the head of the request.
    pub fn operation(&self) -> i32 {
        bytemuck::pod_read_unaligned(&self.input[..4])
    }

    /// Decodes the request arguments that follow the operation code.
    pub fn args<T: bytemuck::Pod>(&self) -> T {
        bytemuck::pod_read_unaligned(&self.input[4..4 + std::mem::size_of::<T>()])
    }
}

/// In-process stand-in for the accelerator driver.
///
/// Allocations are backed by host memory, submissions are recorded and
/// answered with a canned response.
#[derive(Default)]
pub struct RecordingChannel {
    allocations: Mutex<HashMap<u64, Box<[u8]>>>,
    submissions: Mutex<Vec<Submission>>,
    syncs: Mutex<Vec<(u64, usize, SyncDirection, SyncPhase)>>,
    response: Mutex<Vec<u8>>,
    fail_submit: AtomicBool,
    fail_statistics: AtomicBool,
    /// Allocations left before allocate starts failing, unlimited if 0.
    allocation_budget: AtomicUsize,
    allocations_made: AtomicUsize,
    /// Meets the next allocate call on entry and again before it returns.
    pause: Mutex<Option<Arc<Barrier>>>,
    commands: AtomicUsize,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn last(&self) -> Submission {
        self.submissions().pop().expect("no command was submitted")
    }

    pub fn syncs(&self) -> Vec<(u64, usize, SyncDirection, SyncPhase)> {
        self.syncs.lock().unwrap().clone()
    }

    pub fn live_allocations(&self) -> usize {
        self.allocations.lock().unwrap().len()
    }

    pub fn respond_with(&self, bytes: &[u8]) {
        *self.response.lock().unwrap() = bytes.to_vec();
    }

    pub fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_statistics(&self, fail: bool) {
        self.fail_statistics.store(fail, Ordering::SeqCst);
    }

    /// Lets `count` more allocations succeed, then fails the rest.
    pub fn allow_allocations(&self, count: usize) {
        let made = self.allocations_made.load(Ordering::SeqCst);
        self.allocation_budget.store(made + count, Ordering::SeqCst);
    }

    /// Holds the next allocate call inside the driver. Wait on the returned
    /// barrier once to know it is inside, and again to let it finish.
    pub fn pause_next_allocation(&self) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(2));
        *self.pause.lock().unwrap() = Some(barrier.clone());
        barrier
    }
}

impl Channel for RecordingChannel {
    fn allocate(&self, size: usize) -> Result<u64> {
        let pause = self.pause.lock().unwrap().take();
        if let Some(barrier) = &pause {
            barrier.wait();
        }
        let budget = self.allocation_budget.load(Ordering::SeqCst);
        let made = self.allocations_made.fetch_add(1, Ordering::SeqCst);
        if budget != 0 && made >= budget {
            return Err(Error::CreateBufferFailed {
                size,
                reason: Errno::ENOMEM.to_string(),
            });
        }
        let memory = vec![0u8; size].into_boxed_slice();
        let addr = memory.as_ptr() as u64;
        self.allocations.lock().unwrap().insert(addr, memory);
        if let Some(barrier) = pause {
            barrier.wait();
        }
        Ok(addr)
    }

    fn free(&self, addr: u64, _size: usize) -> Result<()> {
        self.allocations
            .lock()
            .unwrap()
            .remove(&addr)
            .map(drop)
            .ok_or(Error::UnmapBufferFailed(Errno::EINVAL))
    }

    fn sync(
        &self,
        addr: u64,
        size: usize,
        direction: SyncDirection,
        phase: SyncPhase,
    ) -> Result<()> {
        self.syncs
            .lock()
            .unwrap()
            .push((addr, size, direction, phase));
        Ok(())
    }

    fn submit(
        &self,
        namespace: Option<&Namespace>,
        input: &[u8],
        output: &mut [u8],
        buffers: &[BufferEntry],
    ) -> Result<()> {
        self.submissions.lock().unwrap().push(Submission {
            namespace: namespace.copied(),
            input: input.to_vec(),
            output_len: output.len(),
            buffers: buffers.to_vec(),
        });
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(Error::RunCommandFailed(Errno::EIO));
        }
        self.commands.fetch_add(1, Ordering::SeqCst);
        let response = self.response.lock().unwrap();
        let len = response.len().min(output.len());
        output[..len].copy_from_slice(&response[..len]);
        Ok(())
    }

    fn statistics(&self, reset: bool) -> Result<KernelStatistics> {
        if self.fail_statistics.load(Ordering::SeqCst) {
            return Err(Error::IoctlFailed(Errno::ENOTTY));
        }
        let commands = if reset {
            self.commands.swap(0, Ordering::SeqCst)
        } else {
            self.commands.load(Ordering::SeqCst)
        };
        Ok(KernelStatistics {
            total_dsp_commands: commands as u32,
            ..Default::default()
        })
    }
}

pub fn device() -> (Device, Arc<RecordingChannel>) {
    let channel = RecordingChannel::new();
    let device = Device::with_channel(Box::new(channel.clone()), Namespace::IMAGING).unwrap();
    (device, channel)
}

/// Image descriptor with reference strides whose planes live at fake
/// addresses starting at `base`. Nothing behind them is ever touched.
pub fn image_at(base: usize, width: usize, height: usize, format: Format) -> Image {
    let planes = format
        .plane_layout(width, height)
        .into_iter()
        .enumerate()
        .map(|(i, layout)| {
            Plane::new(
                Backing::UserPtr(base + i * 0x10_0000),
                layout.stride,
                layout.size,
            )
        })
        .collect();
    Image::new(width, height, format, planes)
}
