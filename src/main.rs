// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::{Args, Command, RawImageArgs};
use clap::Parser;
use dsp_imaging::{
    ops::ResizeParams, Device, DeviceConfig, DspBuffer, ImageBuffer, KernelStatistics, PerfInfo,
    SyncDirection,
};
use serde_json::json;
use std::{
    error::Error,
    fs::{self, File},
    io::{BufWriter, Write},
    process,
    time::Instant,
};
use tracing::{debug, error, info, info_span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    tracing_log::LogTracer::init()?;

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("DSP_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    let journald = if args.journald {
        Some(tracing_journald::layer()?)
    } else {
        None
    };

    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default())
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(journald)
        .with(tracy)
        .try_init()?;
    Ok(())
}

fn micros(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn print_statistics(stats: &KernelStatistics, as_json: bool) {
    if as_json {
        let value = json!({
            "total_dsp_time_us": micros(stats.total_dsp_time),
            "max_dsp_command_time_us": micros(stats.max_dsp_command_time),
            "total_dsp_commands": stats.total_dsp_commands,
            "current_threads_using_dsp": stats.current_threads_using_dsp,
            "max_threads_using_dsp": stats.max_threads_using_dsp,
        });
        println!("{value}");
        return;
    }

    println!("total DSP time:         {:?}", stats.total_dsp_time);
    println!("max DSP command time:   {:?}", stats.max_dsp_command_time);
    println!("total DSP commands:     {}", stats.total_dsp_commands);
    if let Some(average) = stats.average_command_time() {
        println!("average command time:   {average:?}");
    }
    println!("threads using DSP:      {}", stats.current_threads_using_dsp);
    println!("max threads using DSP:  {}", stats.max_threads_using_dsp);
}

/// Loads a raw image file into freshly allocated accelerator planes.
fn load<'d>(device: &'d Device, raw: &RawImageArgs) -> Result<ImageBuffer<'d>, Box<dyn Error>> {
    let (width, height) = raw.dimensions();
    let mut image = ImageBuffer::allocate(device, width, height, raw.format)?;

    let data = fs::read(&raw.input)?;
    let expected: usize = image.planes().map(DspBuffer::len).sum();
    if data.len() != expected {
        return Err(format!(
            "{} holds {} bytes, a {width}x{height} {} image needs {expected}",
            raw.input.display(),
            data.len(),
            raw.format
        )
        .into());
    }

    image.sync_start(SyncDirection::Write)?;
    let mut offset = 0;
    for index in 0..raw.format.planes_count() {
        if let Some(plane) = image.plane_mut(index) {
            let len = plane.len();
            plane
                .as_mut_slice()
                .copy_from_slice(&data[offset..offset + len]);
            offset += len;
        }
    }
    image.sync_end(SyncDirection::Write)?;
    Ok(image)
}

fn save(image: &ImageBuffer, raw: &RawImageArgs) -> Result<(), Box<dyn Error>> {
    let mut writer = BufWriter::new(File::create(&raw.output)?);
    image.sync_start(SyncDirection::Read)?;
    for plane in image.planes() {
        writer.write_all(plane.as_slice())?;
    }
    image.sync_end(SyncDirection::Read)?;
    writer.flush()?;
    info!(
        "wrote {}x{} {} image to {}",
        image.width(),
        image.height(),
        image.format(),
        raw.output.display()
    );
    Ok(())
}

fn report(operation: &str, perf: &PerfInfo, start: Instant) {
    info!(
        "{operation} took {:?}, {} DSP cycles over {} tiles",
        start.elapsed(),
        perf.xrp_handler,
        perf.tiles_count
    );
    debug!(?perf, "{operation} counters");
}

fn run(device: &Device, command: &Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Stats { reset, json } => {
            let stats = device.kernel_statistics()?;
            print_statistics(&stats, *json);
            if *reset {
                device.reset_kernel_statistics()?;
            }
        }
        Command::Utilization { json } => {
            let utilization = device.utilization()?;
            if *json {
                println!("{}", json!({ "utilization": utilization }));
            } else {
                println!("DSP utilization: {utilization}%");
            }
        }
        Command::Resize {
            input,
            output_size,
            crop,
            interpolation,
        } => {
            let src = load(device, input)?;
            let (width, height) = args::dimensions(output_size);
            let dst = ImageBuffer::allocate(device, width, height, input.format)?;
            let crop = args::crop(crop.as_deref(), src.width(), src.height());

            let span = info_span!("resize");
            let _guard = span.enter();
            let start = Instant::now();
            let perf = device.crop_and_resize_perf(
                &ResizeParams {
                    src: &src.image(),
                    dst: &dst.image(),
                    interpolation: (*interpolation).into(),
                },
                &crop,
            )?;
            report("resize", &perf, start);
            save(&dst, input)?;
        }
        Command::Convert { input, to } => {
            let src = load(device, input)?;
            let dst = ImageBuffer::allocate(device, src.width(), src.height(), *to)?;

            let start = Instant::now();
            let perf = device.convert_format_perf(&src.image(), &dst.image())?;
            report("convert", &perf, start);
            save(&dst, input)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let device = match Device::open_with(&DeviceConfig::from(&args)) {
        Ok(device) => device,
        Err(e) => {
            error!("failed to open DSP device {}: {e}", args.device.display());
            process::exit(e.status() as i32);
        }
    };

    let result = run(&device, &args.command);
    device.release();
    result
}
