// SPDX-License-Identifier: GPL-3.0-only

//! Still image camera source
//!
//! Serves frames decoded from image files instead of a live device. Each
//! frame request returns the next image in turn, so a list of files behaves
//! like a camera panning over them. Used for headless scans of existing
//! pictures and for exercising sessions without hardware.

use super::types::*;
use super::{CameraBackend, StreamHandle};
use crate::constants::file_formats;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

/// Camera backend backed by image files
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    paths: Vec<PathBuf>,
}

impl StillImageCamera {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl CameraBackend for StillImageCamera {
    fn name(&self) -> &'static str {
        "still-image"
    }

    fn request_video_stream<'a>(
        &'a self,
        _constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn StreamHandle>>> {
        Box::pin(async move {
            if self.paths.is_empty() {
                return Err(BackendError::DeviceNotFound(
                    "Requested device not found".to_string(),
                ));
            }

            let paths = self.paths.clone();
            let frames = tokio::task::spawn_blocking(move || {
                paths
                    .iter()
                    .map(|path| load_image_as_frame(path))
                    .collect::<BackendResult<Vec<_>>>()
            })
            .await
            .map_err(|e| BackendError::StreamFailed(format!("Image loading task failed: {}", e)))??;

            info!(count = frames.len(), "Still image stream started");
            Ok(Box::new(StillImageStream {
                device: device_for(&self.paths[0], 0),
                frames,
                next: AtomicUsize::new(0),
                active: AtomicBool::new(true),
            }) as Box<dyn StreamHandle>)
        })
    }
}

fn device_for(path: &Path, index: usize) -> CameraDevice {
    CameraDevice {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
        path: path.display().to_string(),
        index,
    }
}

/// Load an image file as a grayscale frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !file_formats::is_image_extension(&extension) {
        return Err(BackendError::FormatNotSupported(format!(
            "Unsupported file format: {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path).map_err(BackendError::from)?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| BackendError::FormatNotSupported(format!("{}: {}", path.display(), e)))?;
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();

    debug!(path = %path.display(), width, height, "Loaded still image");
    Ok(CameraFrame::gray(width, height, luma.into_raw()))
}

/// Stream over preloaded frames
struct StillImageStream {
    device: CameraDevice,
    frames: Vec<CameraFrame>,
    next: AtomicUsize,
    active: AtomicBool,
}

impl StreamHandle for StillImageStream {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        if !self.active.load(Ordering::SeqCst) || self.frames.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let mut frame = self.frames[index].clone();
        frame.sequence = index as u64;
        frame.captured_at = std::time::Instant::now();
        Some(Arc::new(frame))
    }

    fn stop(&mut self) -> BoxFuture<'_, ()> {
        if self.active.swap(false, Ordering::SeqCst) {
            info!(device = %self.device.name, "Still image stream stopped");
        }
        Box::pin(async {})
    }

    fn health(&self) -> BackendResult<()> {
        // Frames are preloaded; nothing can fail after the stream starts
        Ok(())
    }
}
