// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use dsp_imaging::{DeviceConfig, Format, Interpolation, Namespace, Roi};
use std::path::PathBuf;

/// Interpolation used by the resize command.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum InterpolationSetting {
    /// Nearest neighbour sampling
    Nearest,
    /// Bilinear filtering
    Bilinear,
    /// Area averaging (downscale only)
    Area,
    /// Bicubic filtering
    Bicubic,
}

impl From<InterpolationSetting> for Interpolation {
    fn from(setting: InterpolationSetting) -> Self {
        match setting {
            InterpolationSetting::Nearest => Interpolation::NearestNeighbor,
            InterpolationSetting::Bilinear => Interpolation::Bilinear,
            InterpolationSetting::Area => Interpolation::Area,
            InterpolationSetting::Bicubic => Interpolation::Bicubic,
        }
    }
}

/// Command-line arguments for the DSP imaging control tool.
///
/// Global options select the accelerator and logging backends; the
/// subcommand picks what to do with it. Options can be given on the command
/// line or through environment variables.
///
/// # Example
///
/// ```bash
/// # Print kernel statistics as JSON
/// dspctl stats --json
///
/// # Downscale a raw NV12 frame
/// export DSP_DEVICE=/dev/xvp0
/// dspctl resize --input in.nv12 --output out.nv12 \
///     --size "1920 1080" --output-size "640 360" --format nv12
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Accelerator device node
    #[arg(long, env = "DSP_DEVICE", default_value = xrp_sys::XRP_DEVICE_PATH)]
    pub device: PathBuf,

    /// Firmware namespace imaging commands are routed to
    #[arg(
        long,
        env = "DSP_NAMESPACE",
        default_value = "imagingnamespace",
        value_parser = Namespace::new
    )]
    pub namespace: Namespace,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Send logs to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the kernel driver statistics
    Stats {
        /// Reset the counters after reading them
        #[arg(long)]
        reset: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the DSP utilization reported by the firmware
    Utilization {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Crop and resize a raw image file
    Resize {
        #[command(flatten)]
        input: RawImageArgs,

        /// Output resolution in pixels (width height)
        #[arg(long, required = true, value_delimiter = ' ', num_args = 2)]
        output_size: Vec<usize>,

        /// Crop rectangle in source pixels (x0 y0 x1 y1), defaults to the full image
        #[arg(long, value_delimiter = ' ', num_args = 4)]
        crop: Option<Vec<usize>>,

        /// Interpolation method
        #[arg(long, default_value = "bilinear", value_enum)]
        interpolation: InterpolationSetting,
    },

    /// Convert a raw image file between RGB and NV12
    Convert {
        #[command(flatten)]
        input: RawImageArgs,

        /// Output pixel format
        #[arg(long)]
        to: Format,
    },
}

/// A raw image file stored as its planes back to back, each laid out with
/// the reference strides of its format.
#[derive(clap::Args, Debug, Clone)]
pub struct RawImageArgs {
    /// Input image file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output image file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Input resolution in pixels (width height)
    #[arg(long, required = true, value_delimiter = ' ', num_args = 2)]
    pub size: Vec<usize>,

    /// Input pixel format (gray8, rgb, nv12, a420)
    #[arg(long, default_value = "nv12")]
    pub format: Format,
}

impl RawImageArgs {
    pub fn dimensions(&self) -> (usize, usize) {
        dimensions(&self.size)
    }
}

/// Splits a two-value size option. clap guarantees the count.
pub fn dimensions(size: &[usize]) -> (usize, usize) {
    match size {
        [width, height] => (*width, *height),
        _ => (0, 0),
    }
}

/// Reads a crop option, or the full `width` x `height` frame if none was
/// given.
pub fn crop(crop: Option<&[usize]>, width: usize, height: usize) -> Roi {
    match crop {
        Some([x0, y0, x1, y1]) => Roi::new(*x0, *y0, *x1, *y1),
        _ => Roi::new(0, 0, width, height),
    }
}

impl From<&Args> for DeviceConfig {
    fn from(args: &Args) -> Self {
        DeviceConfig {
            path: args.device.clone(),
            namespace: args.namespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parse_resize() {
        let args = Args::try_parse_from([
            "dspctl",
            "resize",
            "--input",
            "in.nv12",
            "--output",
            "out.nv12",
            "--size",
            "1920 1080",
            "--output-size",
            "640 360",
            "--interpolation",
            "area",
        ])
        .unwrap();
        assert_eq!(args.namespace, Namespace::IMAGING);
        let Command::Resize {
            input,
            output_size,
            crop: c,
            interpolation,
        } = args.command
        else {
            panic!("expected resize");
        };
        assert_eq!(input.dimensions(), (1920, 1080));
        assert_eq!(input.format, Format::Nv12);
        assert_eq!(dimensions(&output_size), (640, 360));
        assert_eq!(crop(c.as_deref(), 1920, 1080), Roi::new(0, 0, 1920, 1080));
        assert_eq!(Interpolation::from(interpolation), Interpolation::Area);
    }

    #[test]
    fn reject_short_namespace() {
        assert!(Args::try_parse_from(["dspctl", "--namespace", "short", "stats"]).is_err());
    }
}
