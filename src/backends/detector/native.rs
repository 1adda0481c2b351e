// SPDX-License-Identifier: GPL-3.0-only

//! Native QR code detector
//!
//! Decodes with rqrr. Frames are downscaled and searched for QR grids on a
//! blocking task so the event loop keeps running during decoding.

use super::{BarcodeDetector, DetectorBackend, effective_formats};
use super::types::*;
use crate::backends::camera::CameraFrame;
use crate::backends::camera::format_converters::downscale_gray;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, trace};

const SUPPORTED: &[BarcodeFormat] = &[BarcodeFormat::QrCode];

/// rqrr-backed detection capability
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DetectorBackend for NativeBackend {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Native
    }

    fn supported_formats(&self) -> BoxFuture<'_, DetectorResult<Vec<BarcodeFormat>>> {
        Box::pin(async { Ok(SUPPORTED.to_vec()) })
    }

    fn create_detector(&self, config: &DetectorConfig) -> DetectorResult<Box<dyn BarcodeDetector>> {
        let formats = effective_formats(&config.formats, SUPPORTED)?;
        Ok(Box::new(NativeDetector {
            formats,
            max_dimension: config.max_dimension,
        }))
    }
}

/// QR code detector
struct NativeDetector {
    formats: Vec<BarcodeFormat>,
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl BarcodeDetector for NativeDetector {
    fn detect(&self, frame: Arc<CameraFrame>) -> BoxFuture<'_, DetectorResult<Vec<DetectionResult>>> {
        let max_dimension = self.max_dimension;
        Box::pin(async move {
            let detections = tokio::task::spawn_blocking(move || detect_sync(&frame, max_dimension))
                .await
                .map_err(|e| DetectorError::DetectionFailed(format!("QR detection task failed: {}", e)))?;

            Ok(detections
                .into_iter()
                .filter(|d| self.formats.contains(&d.format))
                .collect())
        })
    }
}

/// Synchronous QR detection (runs in blocking task)
fn detect_sync(frame: &CameraFrame, max_dimension: u32) -> Vec<DetectionResult> {
    let start = std::time::Instant::now();
    let gray = downscale_gray(frame, max_dimension);
    if gray.width == 0 || gray.height == 0 {
        return Vec::new();
    }

    let width = gray.width as usize;
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width,
        gray.height as usize,
        |x, y| gray.data.get(y * width + x).copied().unwrap_or(0),
    );
    let grids = prepared.detect_grids();
    trace!(count = grids.len(), "QR grids located");

    let mut detections = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = %e, "Failed to decode QR grid");
                continue;
            }
        };

        let corners: Vec<(f32, f32)> = grid
            .bounds
            .iter()
            .map(|p| (p.x as f32, p.y as f32))
            .collect();
        let bounds = FrameRegion::from_points(&corners, gray.width, gray.height);

        debug!(content_len = content.len(), "Detected QR code");
        detections.push(DetectionResult::new(content, BarcodeFormat::QrCode).with_bounds(bounds));
    }

    if !detections.is_empty() {
        debug!(
            count = detections.len(),
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_supported_formats() {
        let formats = NativeBackend::new().supported_formats().await.unwrap();
        assert_eq!(formats, vec![BarcodeFormat::QrCode]);
    }

    #[test]
    fn test_create_detector_needs_supported_format() {
        let backend = NativeBackend::new();
        let config = DetectorConfig {
            formats: vec![BarcodeFormat::Ean13],
            max_dimension: 640,
        };
        assert!(matches!(
            backend.create_detector(&config),
            Err(DetectorError::NoFormats)
        ));
    }

    #[tokio::test]
    async fn test_blank_frame_has_no_detections() {
        let backend = NativeBackend::new();
        let detector = backend
            .create_detector(&DetectorConfig {
                formats: vec![BarcodeFormat::QrCode],
                max_dimension: 640,
            })
            .unwrap();

        let frame = Arc::new(CameraFrame::gray(64, 64, vec![255u8; 64 * 64]));
        let detections = detector.detect(frame).await.unwrap();
        assert!(detections.is_empty());
    }
}
