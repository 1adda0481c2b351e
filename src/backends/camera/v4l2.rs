// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture backend
//!
//! Opens a capture node with the v4l crate and runs a memory-mapped stream
//! on its own thread. Each frame is reduced to grayscale and published as
//! the stream's current frame; the session samples it once per poll.

use super::format_converters::{grey_without_stride, mjpeg_to_gray, yuyv_to_gray};
use super::types::*;
use super::{CameraBackend, StreamHandle};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Requested capture size; devices may pick the closest they support
const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;

/// Give up after this many failed dequeues in a row
const MAX_CAPTURE_ERRORS: u32 = 10;

/// Longest a dequeue may block, which bounds how long a stop waits
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// Name fragments that hint at a camera's facing
const ENVIRONMENT_HINTS: &[&str] = &["back", "rear", "world", "environment"];
const USER_HINTS: &[&str] = &["front", "user", "facetime", "integrated", "webcam"];

/// Latest frame slot shared between the capture thread and the handle
type FrameSlot = Arc<Mutex<Option<Arc<CameraFrame>>>>;

/// Error that ended the capture, set by the capture thread
type FailureSlot = Arc<Mutex<Option<BackendError>>>;

/// V4L2 camera backend
#[derive(Debug, Default)]
pub struct V4l2Camera;

impl V4l2Camera {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Camera {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn request_video_stream<'a>(
        &'a self,
        constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn StreamHandle>>> {
        Box::pin(async move {
            if constraints.audio {
                warn!("Audio capture requested, ignoring");
            }

            let devices = tokio::task::spawn_blocking(enumerate_capture_devices)
                .await
                .map_err(|e| BackendError::StreamFailed(format!("Enumeration task failed: {}", e)))?;

            let device = select_device(&devices, constraints).ok_or_else(|| {
                BackendError::DeviceNotFound("Requested device not found".to_string())
            })?;

            info!(device = %device.name, path = %device.path, facing = %constraints.facing, "Opening V4L2 camera");
            let stream = V4l2Stream::start(device).await?;
            Ok(Box::new(stream) as Box<dyn StreamHandle>)
        })
    }
}

/// List V4L2 nodes that can capture video
fn enumerate_capture_devices() -> Vec<CameraDevice> {
    let mut devices = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();

        // Metadata nodes show up next to capture nodes; skip them
        let capture = Device::with_path(&path)
            .and_then(|dev| dev.query_caps())
            .map(|caps| caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE))
            .unwrap_or(false);
        if !capture {
            debug!(path = %path, "Skipping non-capture node");
            continue;
        }

        devices.push(CameraDevice {
            name: node
                .name()
                .unwrap_or_else(|| format!("Video device {}", node.index())),
            path,
            index: node.index(),
        });
    }

    devices.sort_by_key(|d| d.index);
    debug!(count = devices.len(), "Enumerated V4L2 capture devices");
    devices
}

/// Pick the device for a stream request
///
/// An explicit device path wins; a path that was not enumerated is still
/// tried, so the open call reports the real error. Otherwise the facing
/// preference is matched against device names, falling back to the first
/// device.
pub fn select_device(
    devices: &[CameraDevice],
    constraints: &StreamConstraints,
) -> Option<CameraDevice> {
    if let Some(path) = &constraints.device {
        return Some(
            devices
                .iter()
                .find(|d| &d.path == path)
                .cloned()
                .unwrap_or_else(|| CameraDevice {
                    name: path.clone(),
                    path: path.clone(),
                    index: 0,
                }),
        );
    }

    let hints = match constraints.facing {
        FacingMode::Environment => ENVIRONMENT_HINTS,
        FacingMode::User => USER_HINTS,
    };

    devices
        .iter()
        .find(|d| {
            let name = d.name.to_lowercase();
            hints.iter().any(|hint| name.contains(hint))
        })
        .or_else(|| devices.first())
        .cloned()
}

/// Capture thread of one stream
///
/// The device and its mapped buffers belong to the thread, so the camera is
/// closed exactly when the thread returns.
struct CaptureWorker {
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl CaptureWorker {
    fn spawn<F>(name: &str, body: F) -> BackendResult<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread_handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))
            .map_err(|e| BackendError::StreamFailed(format!("Failed to spawn capture thread: {}", e)))?;

        Ok(Self {
            running,
            thread_handle: Some(thread_handle),
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the thread and wait until it has returned
    async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => debug!("Capture thread joined"),
            Ok(Err(_)) => warn!("Capture thread panicked"),
            Err(e) => warn!(error = %e, "Failed to join capture thread"),
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Waits at most one dequeue timeout
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }
}

/// A running V4L2 capture
pub struct V4l2Stream {
    device: CameraDevice,
    latest: FrameSlot,
    failure: FailureSlot,
    worker: CaptureWorker,
}

impl V4l2Stream {
    /// Start the capture thread and wait until the device streams
    async fn start(device: CameraDevice) -> BackendResult<Self> {
        let latest: FrameSlot = Arc::new(Mutex::new(None));
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let path = device.path.clone();
        let latest_clone = Arc::clone(&latest);
        let failure_clone = Arc::clone(&failure);
        let worker = CaptureWorker::spawn("v4l2-capture", move |running| {
            capture_loop(&path, latest_clone, failure_clone, running, ready_tx)
        })?;

        // Dropping the worker on error joins the thread, which has already
        // given up on the device
        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                device,
                latest,
                failure,
                worker,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BackendError::StreamFailed(
                "Capture thread exited before the stream started".to_string(),
            )),
        }
    }
}

impl StreamHandle for V4l2Stream {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        if !self.worker.is_running() {
            return None;
        }
        self.latest.lock().ok().and_then(|slot| slot.clone())
    }

    fn stop(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.worker.is_running() {
                info!(device = %self.device.name, "Stopping V4L2 stream");
            }
            self.worker.stop().await;
            if let Ok(mut slot) = self.latest.lock() {
                *slot = None;
            }
            info!(device = %self.device.name, "V4L2 device released");
        })
    }

    fn health(&self) -> BackendResult<()> {
        match self.failure.lock() {
            Ok(failure) => failure.clone().map_or(Ok(()), Err),
            Err(_) => Err(BackendError::StreamFailed(
                "Capture thread state is unavailable".to_string(),
            )),
        }
    }
}

/// Record why the capture ended and stop serving frames
fn fail_stream(latest: &FrameSlot, failure: &FailureSlot, running: &AtomicBool, error: BackendError) {
    error!(error = %error, "Camera stream failed");
    if let Ok(mut slot) = failure.lock() {
        *slot = Some(error);
    }
    if let Ok(mut slot) = latest.lock() {
        *slot = None;
    }
    running.store(false, Ordering::SeqCst);
}

/// Supported capture encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureEncoding {
    Yuyv,
    Mjpeg,
    Grey,
}

impl CaptureEncoding {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpeg),
            b"GREY" => Some(Self::Grey),
            _ => None,
        }
    }
}

/// Main capture loop running in a separate thread
fn capture_loop(
    device_path: &str,
    latest: FrameSlot,
    failure: FailureSlot,
    running: Arc<AtomicBool>,
    ready: tokio::sync::oneshot::Sender<BackendResult<()>>,
) {
    let mut dev = match Device::with_path(device_path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(BackendError::from(e)));
            return;
        }
    };

    let format = match negotiate_format(&mut dev) {
        Ok(format) => format,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let Some(encoding) = CaptureEncoding::from_fourcc(format.fourcc) else {
        let _ = ready.send(Err(BackendError::FormatNotSupported(format!(
            "Unsupported pixel format {}",
            format.fourcc
        ))));
        return;
    };

    info!(
        width = format.width,
        height = format.height,
        fourcc = %format.fourcc,
        "V4L2 format negotiated"
    );

    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, 4) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(BackendError::StreamFailed(format!(
                "Failed to create buffer stream: {}",
                e
            ))));
            return;
        }
    };

    stream.set_timeout(DEQUEUE_TIMEOUT);

    if ready.send(Ok(())).is_err() {
        // Requester went away (session cancelled during acquisition)
        return;
    }

    let mut consecutive_errors = 0;
    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                consecutive_errors = 0;
                let frame = match to_gray_frame(buf, &format, encoding, meta.sequence as u64) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(error = %e, "Dropping undecodable frame");
                        continue;
                    }
                };
                if let Ok(mut slot) = latest.lock() {
                    *slot = Some(Arc::new(frame));
                }
            }
            // No frame within the timeout; go round to check the stop flag
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                debug!("Dequeue timed out");
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(error = %e, consecutive_errors, "Failed to dequeue frame");
                if consecutive_errors >= MAX_CAPTURE_ERRORS {
                    fail_stream(
                        &latest,
                        &failure,
                        &running,
                        BackendError::StreamFailed(format!("Camera stopped delivering frames: {}", e)),
                    );
                }
            }
        }
    }

    info!(device_path, "V4L2 capture thread stopped");
}

/// Ask for YUYV at the preferred size and take what the driver grants
fn negotiate_format(dev: &mut Device) -> BackendResult<v4l::Format> {
    let mut format = dev.format().map_err(BackendError::from)?;
    format.width = CAPTURE_WIDTH;
    format.height = CAPTURE_HEIGHT;
    format.fourcc = FourCC::new(b"YUYV");

    match dev.set_format(&format) {
        Ok(granted) => Ok(granted),
        Err(e) => {
            warn!(error = %e, "Could not set format, using current device format");
            dev.format().map_err(BackendError::from)
        }
    }
}

fn to_gray_frame(
    buf: &[u8],
    format: &v4l::Format,
    encoding: CaptureEncoding,
    sequence: u64,
) -> BackendResult<CameraFrame> {
    let (width, height, data) = match encoding {
        CaptureEncoding::Yuyv => (
            format.width,
            format.height,
            yuyv_to_gray(buf, format.width, format.height, format.stride),
        ),
        CaptureEncoding::Grey => (
            format.width,
            format.height,
            grey_without_stride(buf, format.width, format.height, format.stride),
        ),
        CaptureEncoding::Mjpeg => mjpeg_to_gray(buf)?,
    };

    Ok(CameraFrame {
        sequence,
        captured_at: Instant::now(),
        ..CameraFrame::gray(width, height, data)
    })
}
