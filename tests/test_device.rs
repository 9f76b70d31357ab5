// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Tests against a real accelerator. Run on target with
//! `cargo test -- --ignored`.

use dsp_imaging::{
    ops::ResizeParams, Device, DmaImage, Format, ImageBuffer, Interpolation, Roi, SyncDirection,
};
use serial_test::serial;
use std::{error::Error, time::Instant};

fn fill_gradient(image: &mut ImageBuffer) -> Result<(), Box<dyn Error>> {
    let width = image.width();
    image.sync_start(SyncDirection::Write)?;
    for index in 0..image.format().planes_count() {
        if let Some(plane) = image.plane_mut(index) {
            for (i, byte) in plane.as_mut_slice().iter_mut().enumerate() {
                *byte = (i % width) as u8;
            }
        }
    }
    image.sync_end(SyncDirection::Write)?;
    Ok(())
}

#[test]
#[serial]
#[ignore = "requires the DSP device"]
fn test_statistics() -> Result<(), Box<dyn Error>> {
    let device = Device::open()?;
    let stats = device.kernel_statistics()?;
    println!("{stats:?}");
    println!("utilization {}%", device.utilization()?);
    device.release();
    Ok(())
}

#[test]
#[serial]
#[ignore = "requires the DSP device"]
fn test_resize() -> Result<(), Box<dyn Error>> {
    let device = Device::open()?;
    let mut src = ImageBuffer::allocate(&device, 1920, 1080, Format::Nv12)?;
    let dst = ImageBuffer::allocate(&device, 640, 360, Format::Nv12)?;
    fill_gradient(&mut src)?;

    let now = Instant::now();
    let perf = device.crop_and_resize_perf(
        &ResizeParams {
            src: &src.image(),
            dst: &dst.image(),
            interpolation: Interpolation::Bilinear,
        },
        &Roi::new(0, 0, 1920, 1080),
    )?;
    println!("resize {:?} {perf:?}", now.elapsed());
    assert!(perf.tiles_count > 0);

    src.release()?;
    dst.release()?;
    device.release();
    Ok(())
}

#[test]
#[serial]
#[ignore = "requires the DSP device"]
fn test_convert_dmabuf() -> Result<(), Box<dyn Error>> {
    let device = Device::open()?;
    let src = DmaImage::allocate(1280, 720, Format::Rgb)?;
    let dst = DmaImage::allocate(1280, 720, Format::Nv12)?;
    let white = vec![0xff; src.image().planes[0].size];
    src.write_plane(0, &white)?;

    let now = Instant::now();
    device.convert_format(&src.image(), &dst.image())?;
    println!("convert {:?}", now.elapsed());

    let luma = dst.read_plane(0)?;
    assert!(luma.iter().all(|y| *y > 200));
    device.release();
    Ok(())
}

#[test]
#[serial]
#[ignore = "requires the DSP device"]
fn test_buffer_lifecycle() -> Result<(), Box<dyn Error>> {
    let device = Device::open()?;
    for _ in 0..100 {
        let mut buffer = device.allocate_buffer(1 << 20)?;
        buffer.sync_start(SyncDirection::Write)?;
        buffer.as_mut_slice().fill(0);
        buffer.sync_end(SyncDirection::Write)?;
        buffer.release()?;
    }
    assert_eq!(device.live_buffers(), 0);
    device.release();
    Ok(())
}
