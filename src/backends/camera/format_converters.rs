// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for capture backends
//!
//! Detectors work on luminance only, so every capture format is reduced to
//! a tightly packed 8-bit grayscale buffer here.

use super::types::{BackendError, BackendResult, CameraFrame};
use std::sync::Arc;

/// Extract the Y plane from packed YUYV (YUV 4:2:2)
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// `stride` is the number of bytes per row (at least `width * 2`).
pub fn yuyv_to_gray(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = (stride as usize).max(w * 2);
    let mut gray = Vec::with_capacity(w * h);

    for row in data.chunks(stride).take(h) {
        gray.extend(row.iter().step_by(2).take(w));
    }

    // Short buffers (truncated frames) are padded black
    gray.resize(w * h, 0);
    gray
}

/// Copy an 8-bit grayscale buffer, dropping stride padding
pub fn grey_without_stride(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = (stride as usize).max(w);
    let mut gray = Vec::with_capacity(w * h);

    for row in data.chunks(stride).take(h) {
        gray.extend_from_slice(&row[..row.len().min(w)]);
    }

    gray.resize(w * h, 0);
    gray
}

/// Decode one MJPEG frame to grayscale
///
/// Returns the decoded dimensions with the pixels, since a JPEG may not
/// match the negotiated size exactly.
pub fn mjpeg_to_gray(data: &[u8]) -> BackendResult<(u32, u32, Vec<u8>)> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| BackendError::StreamFailed(format!("Failed to decode MJPEG frame: {}", e)))?;
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();
    Ok((width, height, luma.into_raw()))
}

/// Downscale a frame so that neither side exceeds `max_dimension`
///
/// Uses bilinear interpolation on luminance. Frames already small enough
/// are returned as grayscale without resampling.
pub fn downscale_gray(frame: &CameraFrame, max_dimension: u32) -> CameraFrame {
    let gray = frame.to_gray();
    if max_dimension == 0 || (gray.width <= max_dimension && gray.height <= max_dimension) {
        return gray;
    }

    let scale = (gray.width as f32 / max_dimension as f32)
        .max(gray.height as f32 / max_dimension as f32);
    let dst_width = ((gray.width as f32 / scale) as u32).max(1);
    let dst_height = ((gray.height as f32 / scale) as u32).max(1);

    let src_width = gray.width as usize;
    let src_height = gray.height as usize;
    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;
    let pixel = |x: usize, y: usize| gray.data.get(y * src_width + x).copied().unwrap_or(0) as f32;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);
    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as usize;
            let y0 = src_y as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let value = pixel(x0, y0) * (1.0 - x_frac) * (1.0 - y_frac)
                + pixel(x1, y0) * x_frac * (1.0 - y_frac)
                + pixel(x0, y1) * (1.0 - x_frac) * y_frac
                + pixel(x1, y1) * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    CameraFrame {
        width: dst_width,
        height: dst_height,
        data: Arc::from(result),
        stride: dst_width,
        ..gray
    }
}
