// SPDX-License-Identifier: GPL-3.0-only

//! Fallback QR code detector
//!
//! Decodes with bardecoder. Always compiled, so a build without the native
//! detector still scans. bardecoder works on `image` 0.24 types, hence the
//! `image024` alias.

use super::{BarcodeDetector, DetectorBackend, effective_formats};
use super::types::*;
use crate::backends::camera::CameraFrame;
use crate::backends::camera::format_converters::downscale_gray;
use futures::future::BoxFuture;
use image024::{DynamicImage, GrayImage};
use std::sync::Arc;
use tracing::{debug, trace};

const SUPPORTED: &[BarcodeFormat] = &[BarcodeFormat::QrCode];

/// bardecoder-backed detection capability
#[derive(Debug, Default)]
pub struct FallbackBackend;

impl FallbackBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DetectorBackend for FallbackBackend {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Fallback
    }

    fn supported_formats(&self) -> BoxFuture<'_, DetectorResult<Vec<BarcodeFormat>>> {
        Box::pin(async { Ok(SUPPORTED.to_vec()) })
    }

    fn create_detector(&self, config: &DetectorConfig) -> DetectorResult<Box<dyn BarcodeDetector>> {
        let formats = effective_formats(&config.formats, SUPPORTED)?;
        Ok(Box::new(FallbackDetector {
            formats,
            max_dimension: config.max_dimension,
        }))
    }
}

struct FallbackDetector {
    formats: Vec<BarcodeFormat>,
    max_dimension: u32,
}

impl BarcodeDetector for FallbackDetector {
    fn detect(&self, frame: Arc<CameraFrame>) -> BoxFuture<'_, DetectorResult<Vec<DetectionResult>>> {
        let max_dimension = self.max_dimension;
        Box::pin(async move {
            let detections = tokio::task::spawn_blocking(move || detect_sync(&frame, max_dimension))
                .await
                .map_err(|e| DetectorError::DetectionFailed(format!("QR detection task failed: {}", e)))??;

            Ok(detections
                .into_iter()
                .filter(|d| self.formats.contains(&d.format))
                .collect())
        })
    }
}

fn detect_sync(frame: &CameraFrame, max_dimension: u32) -> DetectorResult<Vec<DetectionResult>> {
    let gray = downscale_gray(frame, max_dimension);
    let buffer = GrayImage::from_raw(gray.width, gray.height, gray.data.to_vec()).ok_or_else(|| {
        DetectorError::InvalidFrame(format!(
            "{} bytes do not fill {}x{}",
            gray.data.len(),
            gray.width,
            gray.height
        ))
    })?;
    let image = DynamicImage::ImageLuma8(buffer);

    let decoder = bardecoder::default_decoder();
    let results = decoder.decode(&image);
    trace!(count = results.len(), "bardecoder results");

    let mut detections = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(content) => {
                debug!(content_len = content.len(), "Detected QR code");
                detections.push(DetectionResult::new(content, BarcodeFormat::QrCode));
            }
            Err(e) => debug!(error = ?e, "Failed to decode QR code"),
        }
    }

    Ok(detections)
}
