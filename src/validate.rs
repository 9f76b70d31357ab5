// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Geometry and format checks run before anything is registered or sent to
//! the accelerator.
//!
//! Every check is pure. A failure logs the offending field through `tracing`
//! and returns [`Error::InvalidArgument`](crate::Error::InvalidArgument).

use crate::{
    error::{invalid_argument, Result},
    image::{
        Backing, BufferRef, DewarpMesh, Format, Image, Interpolation, Plane, PrivacyMask, Roi,
        Vsm, MAX_PLANES,
    },
};

/// Bytes per pixel and horizontal/vertical subsampling of one plane.
#[derive(Clone, Copy)]
struct PlaneShape {
    bytes_per_pixel: usize,
    width_ratio: usize,
    height_ratio: usize,
}

const FULL: PlaneShape = PlaneShape {
    bytes_per_pixel: 1,
    width_ratio: 1,
    height_ratio: 1,
};

const QUARTER: PlaneShape = PlaneShape {
    bytes_per_pixel: 1,
    width_ratio: 2,
    height_ratio: 2,
};

const PACKED_RGB: PlaneShape = PlaneShape {
    bytes_per_pixel: 3,
    width_ratio: 1,
    height_ratio: 1,
};

const INTERLEAVED_UV: PlaneShape = PlaneShape {
    bytes_per_pixel: 2,
    width_ratio: 2,
    height_ratio: 2,
};

fn plane_shapes(format: Format) -> &'static [PlaneShape] {
    const GRAY8: [PlaneShape; 1] = [FULL];
    const RGB: [PlaneShape; 1] = [PACKED_RGB];
    const NV12: [PlaneShape; 2] = [FULL, INTERLEAVED_UV];
    const A420: [PlaneShape; 4] = [FULL, QUARTER, QUARTER, FULL];
    match format {
        Format::Gray8 => &GRAY8,
        Format::Rgb => &RGB,
        Format::Nv12 => &NV12,
        Format::A420 => &A420,
    }
}

fn backing(name: &str, backing: &Backing) -> Result<()> {
    if backing.is_null() {
        return Err(invalid_argument!("{name} is null ({backing})"));
    }
    Ok(())
}

fn product(name: &str, a: usize, b: usize) -> Result<usize> {
    a.checked_mul(b)
        .ok_or_else(|| invalid_argument!("{name} overflows ({a} * {b})"))
}

fn end(name: &str, offset: usize, len: usize) -> Result<usize> {
    offset
        .checked_add(len)
        .ok_or_else(|| invalid_argument!("{name} overflows ({offset} + {len})"))
}

fn plane(name: &str, image: &Image, index: usize, plane: &Plane, shape: PlaneShape) -> Result<()> {
    backing(&format!("{name} plane[{index}]"), &plane.backing)?;

    if plane.backing.kind() != image.memory {
        return Err(invalid_argument!(
            "{name} plane[{index}] memory kind {:?} does not match the image memory kind {:?}",
            plane.backing.kind(),
            image.memory
        ));
    }

    let min_stride = product(
        &format!("{name} plane[{index}] row bytes"),
        image.width,
        shape.bytes_per_pixel,
    )?
    .div_ceil(shape.width_ratio);
    if plane.stride < min_stride {
        return Err(invalid_argument!(
            "{name} plane[{index}] line stride ({}) is too small for a {} image {} pixels wide",
            plane.stride,
            image.format,
            image.width
        ));
    }

    let min_size = product(
        &format!("{name} plane[{index}] minimum size"),
        plane.stride,
        image.height,
    )?
    .div_ceil(shape.height_ratio);
    if plane.size < min_size {
        return Err(invalid_argument!(
            "{name} plane[{index}] size ({}) is too small for line stride {} and height {}",
            plane.size,
            plane.stride,
            image.height
        ));
    }

    Ok(())
}

/// Checks dimensions, plane count and every plane's stride and size against
/// the image format.
pub fn image(name: &str, image: &Image) -> Result<()> {
    if image.width == 0 {
        return Err(invalid_argument!("{name} width is 0"));
    }
    if image.height == 0 {
        return Err(invalid_argument!("{name} height is 0"));
    }
    if image.planes.is_empty() {
        return Err(invalid_argument!("{name} has no planes"));
    }

    let shapes = plane_shapes(image.format);
    if image.planes.len() != shapes.len() {
        return Err(invalid_argument!(
            "{name} format {} should contain {} plane(s), got {}",
            image.format,
            shapes.len(),
            image.planes.len()
        ));
    }
    debug_assert!(shapes.len() <= MAX_PLANES);

    if image.format.is_yuv420() && (image.width % 2 != 0 || image.height % 2 != 0) {
        return Err(invalid_argument!(
            "{name} is {}x{} but {} width and height must be even",
            image.width,
            image.height,
            image.format
        ));
    }

    for (index, (p, shape)) in image.planes.iter().zip(shapes).enumerate() {
        plane(name, image, index, p, *shape)?;
    }

    Ok(())
}

/// Checks `start < end <= limit` on both axes.
pub fn roi(name: &str, roi: &Roi, width: usize, height: usize) -> Result<()> {
    if roi.start_x >= roi.end_x {
        return Err(invalid_argument!(
            "{name} start_x ({}) must be smaller than end_x ({})",
            roi.start_x,
            roi.end_x
        ));
    }
    if roi.start_y >= roi.end_y {
        return Err(invalid_argument!(
            "{name} start_y ({}) must be smaller than end_y ({})",
            roi.start_y,
            roi.end_y
        ));
    }
    if roi.end_x > width {
        return Err(invalid_argument!(
            "{name} end_x ({}) exceeds the width ({width})",
            roi.end_x
        ));
    }
    if roi.end_y > height {
        return Err(invalid_argument!(
            "{name} end_y ({}) exceeds the height ({height})",
            roi.end_y
        ));
    }
    Ok(())
}

/// Checks a crop box against the source and re-validates the cropped view.
pub fn crop(src: &Image, crop: &Roi) -> Result<()> {
    roi("crop", crop, src.width, src.height)?;
    image("cropped src", &src.cropped(crop))
}

pub fn format(name: &str, image: &Image, allowed: &[Format]) -> Result<()> {
    if !allowed.contains(&image.format) {
        return Err(invalid_argument!(
            "{name} format {} is not supported here (expected one of {})",
            image.format,
            allowed
                .iter()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    Ok(())
}

pub fn same_format(src: &Image, dst: &Image) -> Result<()> {
    if src.format != dst.format {
        return Err(invalid_argument!(
            "src format {} and dst format {} must match",
            src.format,
            dst.format
        ));
    }
    Ok(())
}

pub fn same_size(src: &Image, dst: &Image) -> Result<()> {
    if src.width != dst.width || src.height != dst.height {
        return Err(invalid_argument!(
            "src ({}x{}) and dst ({}x{}) must have the same size",
            src.width,
            src.height,
            dst.width,
            dst.height
        ));
    }
    Ok(())
}

pub fn interpolation(interpolation: Interpolation, allowed: &[Interpolation]) -> Result<()> {
    if !allowed.contains(&interpolation) {
        return Err(invalid_argument!(
            "interpolation {interpolation:?} is not supported here (expected one of {allowed:?})"
        ));
    }
    Ok(())
}

/// Area interpolation only downscales.
pub fn scaling(
    interpolation: Interpolation,
    src_width: usize,
    src_height: usize,
    dst: &Image,
) -> Result<()> {
    if interpolation == Interpolation::Area && (dst.width > src_width || dst.height > src_height) {
        return Err(invalid_argument!(
            "area interpolation cannot upscale {src_width}x{src_height} to {}x{}",
            dst.width,
            dst.height
        ));
    }
    Ok(())
}

/// Rejects `count` when it exceeds the wire capacity instead of truncating.
pub fn capacity(name: &str, count: usize, capacity: usize) -> Result<()> {
    if count > capacity {
        return Err(invalid_argument!(
            "too many {name}: {count} (at most {capacity})"
        ));
    }
    Ok(())
}

/// Blur kernels are odd-sized, from 1 up to 33 pixels.
pub fn kernel_size(kernel_size: usize) -> Result<()> {
    if kernel_size == 0 || kernel_size > 33 || kernel_size % 2 == 0 {
        return Err(invalid_argument!(
            "kernel size ({kernel_size}) must be odd and between 1 and 33"
        ));
    }
    Ok(())
}

/// Overlays are placed entirely inside the base image.
pub fn placement(name: &str, base: &Image, overlay: &Image, x: usize, y: usize) -> Result<()> {
    if end(name, x, overlay.width)? > base.width || end(name, y, overlay.height)? > base.height {
        return Err(invalid_argument!(
            "{name} ({}x{} at {x},{y}) does not fit inside the {}x{} base image",
            overlay.width,
            overlay.height,
            base.width,
            base.height
        ));
    }
    Ok(())
}

/// The mesh grid must cover `dst` when tiled at 64-pixel cells.
pub fn mesh(mesh: &DewarpMesh, dst: &Image) -> Result<()> {
    if mesh.mesh_width == 0 || mesh.mesh_height == 0 {
        return Err(invalid_argument!(
            "mesh size is {}x{}",
            mesh.mesh_width,
            mesh.mesh_height
        ));
    }
    backing("mesh table", &mesh.table)?;

    let (min_width, min_height) = DewarpMesh::minimum_size(dst.width, dst.height);
    if mesh.mesh_width < min_width {
        return Err(invalid_argument!(
            "mesh width ({}) is too small, at least {min_width} cells are needed for dst width {}",
            mesh.mesh_width,
            dst.width
        ));
    }
    if mesh.mesh_height < min_height {
        return Err(invalid_argument!(
            "mesh height ({}) is too small, at least {min_height} cells are needed for dst height {}",
            mesh.mesh_height,
            dst.height
        ));
    }

    let line_stride = mesh.line_stride().ok_or_else(|| {
        invalid_argument!("mesh width ({}) overflows the line stride", mesh.mesh_width)
    })?;
    let size = product("mesh table size", line_stride, mesh.mesh_height)?;
    if u32::try_from(size).is_err() {
        return Err(invalid_argument!(
            "mesh table size ({size}) does not fit the 32-bit plane size"
        ));
    }
    Ok(())
}

fn buffer(name: &str, buffer: &BufferRef, min_size: usize) -> Result<()> {
    backing(name, &buffer.backing)?;
    if buffer.size < min_size {
        return Err(invalid_argument!(
            "{name} size ({}) is too small, at least {min_size} bytes are needed",
            buffer.size
        ));
    }
    Ok(())
}

/// Checks mask regions and the bitmask in the quantized coordinate space of
/// `src`.
pub fn privacy_mask(mask: &PrivacyMask, src: &Image, max_rois: usize) -> Result<()> {
    capacity("privacy mask rois", mask.rois.len(), max_rois)?;

    let (qwidth, qheight) = PrivacyMask::quantized_size(src.width, src.height);
    for (i, r) in mask.rois.iter().enumerate() {
        roi(&format!("privacy mask roi[{i}]"), r, qwidth, qheight)?;
    }

    let bitmask = &mask.bitmask;
    backing("privacy mask bitmask", &bitmask.backing)?;
    let row_bytes = qwidth.div_ceil(8);
    if bitmask.stride < row_bytes {
        return Err(invalid_argument!(
            "privacy mask bitmask line stride ({}) is too small, {qwidth} cells need {row_bytes} bytes",
            bitmask.stride
        ));
    }
    if bitmask.size < product("privacy mask bitmask size", bitmask.stride, qheight)? {
        return Err(invalid_argument!(
            "privacy mask bitmask size ({}) is too small for line stride {} and {qheight} rows",
            bitmask.size,
            bitmask.stride
        ));
    }
    Ok(())
}

/// The stabilization window lies inside `src` and the search range fits
/// inside the window.
pub fn vsm(vsm: &Vsm, src: &Image) -> Result<()> {
    let config = &vsm.config;
    if config.width == 0 || config.height == 0 {
        return Err(invalid_argument!(
            "vsm window size is {}x{}",
            config.width,
            config.height
        ));
    }
    if end("vsm window", config.hoffset, config.width)? > src.width
        || end("vsm window", config.voffset, config.height)? > src.height
    {
        return Err(invalid_argument!(
            "vsm window ({}x{} at {},{}) does not fit inside the {}x{} src image",
            config.width,
            config.height,
            config.hoffset,
            config.voffset,
            src.width,
            src.height
        ));
    }
    let search = product("vsm search range", config.max_displacement, 2)?;
    if search >= config.width || search >= config.height {
        return Err(invalid_argument!(
            "vsm max displacement ({}) must be smaller than half the window size",
            config.max_displacement
        ));
    }

    let entry = std::mem::size_of::<u32>();
    buffer("vsm rows", &vsm.rows, product("vsm rows size", config.height, entry)?)?;
    buffer(
        "vsm columns",
        &vsm.columns,
        product("vsm columns size", config.width, entry)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{MaskColor, VsmConfig};

    fn plane_at(addr: usize, stride: usize, size: usize) -> Plane {
        Plane::new(Backing::UserPtr(addr), stride, size)
    }

    fn gray8(width: usize, height: usize, stride: usize) -> Image {
        Image::new(
            width,
            height,
            Format::Gray8,
            vec![plane_at(0x1000, stride, stride * height)],
        )
    }

    fn nv12(width: usize, height: usize) -> Image {
        Image::new(
            width,
            height,
            Format::Nv12,
            vec![
                plane_at(0x1000, width, width * height),
                plane_at(0x2000, width, width * height / 2),
            ],
        )
    }

    #[test]
    fn gray8_stride_must_cover_width() {
        assert!(image("src", &gray8(100, 50, 100)).is_ok());

        let mut short = gray8(100, 50, 100);
        short.planes[0].stride = 90;
        let err = image("src", &short).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("plane[0] line stride (90)"));
    }

    #[test]
    fn gray8_size_must_cover_height() {
        let mut img = gray8(100, 50, 100);
        img.planes[0].size = 4999;
        assert!(image("src", &img).is_err());
    }

    #[test]
    fn rgb_stride_counts_three_bytes_per_pixel() {
        let img = Image::new(10, 4, Format::Rgb, vec![plane_at(0x1000, 29, 29 * 4)]);
        assert!(image("src", &img).is_err());
        let img = Image::new(10, 4, Format::Rgb, vec![plane_at(0x1000, 30, 30 * 4)]);
        assert!(image("src", &img).is_ok());
    }

    #[test]
    fn nv12_minimum_planes() {
        assert!(image("src", &nv12(64, 64)).is_ok());

        let mut img = nv12(64, 64);
        img.planes[1].size = 2047;
        assert!(image("src", &img).is_err());
    }

    #[test]
    fn nv12_odd_dimensions_fail() {
        let mut img = nv12(64, 64);
        img.width = 63;
        let err = image("src", &img).unwrap_err();
        assert!(err.to_string().contains("must be even"));
    }

    #[test]
    fn a420_chroma_planes_are_half_resolution() {
        let img = Image::new(
            32,
            16,
            Format::A420,
            vec![
                plane_at(0x1000, 32, 512),
                plane_at(0x2000, 16, 128),
                plane_at(0x3000, 16, 128),
                plane_at(0x4000, 32, 512),
            ],
        );
        assert!(image("overlay", &img).is_ok());

        let mut narrow = img.clone();
        narrow.planes[2].stride = 15;
        assert!(image("overlay", &narrow).is_err());
    }

    #[test]
    fn plane_count_must_match_format() {
        let mut img = nv12(64, 64);
        img.planes.pop();
        let err = image("dst", &img).unwrap_err();
        assert!(err.to_string().contains("should contain 2 plane(s)"));
    }

    #[test]
    fn null_and_mixed_backings_fail() {
        let mut img = gray8(16, 16, 16);
        img.planes[0].backing = Backing::UserPtr(0);
        assert!(image("src", &img).is_err());

        let mut img = nv12(16, 16);
        img.planes[1].backing = Backing::DmaBuf(5);
        assert!(image("src", &img).is_err());
    }

    #[test]
    fn zero_dimensions_fail() {
        assert!(image("src", &gray8(0, 16, 16)).is_err());
        assert!(image("src", &gray8(16, 0, 16)).is_err());
    }

    #[test]
    fn roi_bounds() {
        assert!(roi("roi", &Roi::new(0, 0, 64, 64), 64, 64).is_ok());
        assert!(roi("roi", &Roi::new(10, 0, 5, 8), 1000, 1000).is_err());
        assert!(roi("roi", &Roi::new(0, 8, 8, 8), 64, 64).is_err());
        assert!(roi("roi", &Roi::new(0, 0, 65, 8), 64, 64).is_err());
        assert!(roi("roi", &Roi::new(0, 0, 8, 65), 64, 64).is_err());
    }

    #[test]
    fn odd_crop_of_nv12_fails() {
        let src = nv12(64, 64);
        assert!(crop(&src, &Roi::new(0, 0, 32, 32)).is_ok());
        assert!(crop(&src, &Roi::new(0, 0, 33, 32)).is_err());
    }

    #[test]
    fn area_interpolation_only_downscales() {
        let dst = gray8(100, 40, 100);
        assert!(scaling(Interpolation::Area, 100, 50, &dst).is_ok());
        assert!(scaling(Interpolation::Area, 99, 50, &dst).is_err());
        assert!(scaling(Interpolation::Area, 100, 39, &dst).is_err());
        assert!(scaling(Interpolation::Bicubic, 10, 10, &dst).is_ok());
        assert!(scaling(Interpolation::NearestNeighbor, 10, 10, &dst).is_ok());
    }

    #[test]
    fn kernel_sizes() {
        assert!(kernel_size(1).is_ok());
        assert!(kernel_size(33).is_ok());
        assert!(kernel_size(0).is_err());
        assert!(kernel_size(4).is_err());
        assert!(kernel_size(35).is_err());
    }

    #[test]
    fn mesh_must_cover_destination() {
        let dst = nv12(640, 480);
        let mesh_of = |w, h| DewarpMesh {
            mesh_width: w,
            mesh_height: h,
            table: Backing::UserPtr(0x8000),
        };
        assert!(mesh(&mesh_of(10, 8), &dst).is_ok());
        assert!(mesh(&mesh_of(9, 8), &dst).is_err());
        assert!(mesh(&mesh_of(10, 7), &dst).is_err());
        assert!(mesh(&mesh_of(0, 8), &dst).is_err());

        let mut null = mesh_of(10, 8);
        null.table = Backing::UserPtr(0);
        assert!(mesh(&null, &dst).is_err());
    }

    #[test]
    fn privacy_mask_uses_quantized_space() {
        let src = nv12(66, 64);
        // 66 pixels quantize to 17 cells.
        let mask = |rois: Vec<Roi>| PrivacyMask {
            color: MaskColor::default(),
            rois,
            bitmask: plane_at(0x9000, 3, 3 * 16),
        };
        assert!(privacy_mask(&mask(vec![Roi::new(0, 0, 17, 16)]), &src, 8).is_ok());
        assert!(privacy_mask(&mask(vec![Roi::new(0, 0, 18, 16)]), &src, 8).is_err());
        assert!(privacy_mask(&mask(vec![Roi::new(0, 0, 66, 64)]), &src, 8).is_err());
        assert!(privacy_mask(&mask(vec![Roi::new(0, 0, 1, 1); 9]), &src, 8).is_err());

        let mut short = mask(vec![]);
        short.bitmask.stride = 2;
        assert!(privacy_mask(&short, &src, 8).is_err());
    }

    #[test]
    fn vsm_window_and_displacement() {
        let src = nv12(640, 480);
        let vsm_of = |config: VsmConfig| Vsm {
            config,
            rows: BufferRef::new(Backing::UserPtr(0x1000), 4 * 400),
            columns: BufferRef::new(Backing::UserPtr(0x2000), 4 * 600),
        };
        let config = VsmConfig {
            hoffset: 20,
            voffset: 40,
            width: 600,
            height: 400,
            max_displacement: 64,
        };
        assert!(vsm(&vsm_of(config), &src).is_ok());
        assert!(vsm(&vsm_of(VsmConfig { hoffset: 41, ..config }), &src).is_err());
        assert!(vsm(&vsm_of(VsmConfig { max_displacement: 200, ..config }), &src).is_err());

        let mut small = vsm_of(config);
        small.rows.size = 4 * 399;
        assert!(vsm(&small, &src).is_err());
    }

    #[test]
    fn oversized_geometry_fails_instead_of_wrapping() {
        let huge_stride = Image::new(
            16,
            16,
            Format::Gray8,
            vec![plane_at(0x1000, usize::MAX / 2, usize::MAX)],
        );
        assert!(image("src", &huge_stride).unwrap_err().is_invalid_argument());

        let wide_rgb = Image::new(
            usize::MAX / 2,
            2,
            Format::Rgb,
            vec![plane_at(0x1000, 64, 128)],
        );
        assert!(image("src", &wide_rgb).unwrap_err().is_invalid_argument());

        let base = gray8(64, 64, 64);
        let overlay = gray8(16, 16, 16);
        assert!(placement("overlay[0]", &base, &overlay, usize::MAX, 0).is_err());
        assert!(placement("overlay[0]", &base, &overlay, 0, usize::MAX).is_err());
    }

    #[test]
    fn mesh_table_must_fit_u32() {
        let dst = nv12(640, 480);
        let overflowing = DewarpMesh {
            mesh_width: usize::MAX / 4,
            mesh_height: 8,
            table: Backing::UserPtr(0x8000),
        };
        assert_eq!(overflowing.table_size(), None);
        assert!(mesh(&overflowing, &dst).unwrap_err().is_invalid_argument());

        // 8 GiB of vertices.
        let oversized = DewarpMesh {
            mesh_width: 1 << 20,
            mesh_height: 1 << 10,
            table: Backing::UserPtr(0x8000),
        };
        assert!(mesh(&oversized, &dst).is_err());
    }

    #[test]
    fn oversized_mask_and_vsm_fail_instead_of_wrapping() {
        let src = nv12(64, 64);
        let mask = PrivacyMask {
            color: MaskColor::default(),
            rois: vec![],
            bitmask: plane_at(0x9000, usize::MAX, 64),
        };
        assert!(privacy_mask(&mask, &src, 8).unwrap_err().is_invalid_argument());

        let src = nv12(640, 480);
        let vsm_of = |config: VsmConfig| Vsm {
            config,
            rows: BufferRef::new(Backing::UserPtr(0x1000), 4 * 400),
            columns: BufferRef::new(Backing::UserPtr(0x2000), 4 * 600),
        };
        let config = VsmConfig {
            hoffset: 20,
            voffset: 40,
            width: 600,
            height: 400,
            max_displacement: 64,
        };
        assert!(vsm(&vsm_of(VsmConfig { hoffset: usize::MAX, ..config }), &src).is_err());
        assert!(vsm(&vsm_of(VsmConfig { voffset: usize::MAX, ..config }), &src).is_err());
        let far = VsmConfig {
            max_displacement: usize::MAX,
            ..config
        };
        assert!(vsm(&vsm_of(far), &src).unwrap_err().is_invalid_argument());
    }
}
