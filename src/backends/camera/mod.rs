// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! A scan session only needs two things from a camera: a stream it owns
//! exclusively, and the stream's most recent frame. Everything else
//! (device discovery, pixel format negotiation, capture threads) stays
//! behind the [`CameraBackend`] trait.
//!
//! ```text
//! ┌─────────────────────┐
//! │  Session Controller │
//! └──────────┬──────────┘
//!            │ request_video_stream()
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │
//! └──────────┬──────────┘
//!       ┌────┴──────┐
//!       ▼           ▼
//!   ┌──────┐  ┌────────────┐
//!   │ V4L2 │  │ StillImage │
//!   └──────┘  └────────────┘
//! ```

pub mod format_converters;
pub mod still_image;
pub mod types;
pub mod v4l2;

pub use still_image::StillImageCamera;
pub use types::*;
pub use v4l2::V4l2Camera;

use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;

/// Camera capability used by scan sessions
pub trait CameraBackend: Send + Sync {
    /// Short backend identifier for logs
    fn name(&self) -> &'static str;

    /// Acquire a video stream
    ///
    /// The returned handle is owned by the caller; the camera stays busy until
    /// [`StreamHandle::stop`] is called or the handle is dropped.
    ///
    /// # Errors
    /// * `BackendError::PermissionDenied` - access to the device was refused
    /// * `BackendError::DeviceNotFound` - no camera matches the constraints
    /// * `BackendError::StreamFailed` - the device refused to stream
    fn request_video_stream<'a>(
        &'a self,
        constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn StreamHandle>>>;
}

/// An acquired camera stream
pub trait StreamHandle: Send + Sync {
    /// Device this stream was opened on
    fn device(&self) -> &CameraDevice;

    /// Most recent frame, `None` until the first frame arrives
    fn current_frame(&self) -> Option<Arc<CameraFrame>>;

    /// Release the camera
    ///
    /// Resolves once the device is closed, so the next request can open it
    /// again. Calling it again has no effect.
    fn stop(&mut self) -> BoxFuture<'_, ()>;

    /// `Ok` while the stream delivers frames; the error that ended it once
    /// the device has gone away
    fn health(&self) -> BackendResult<()>;
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// A V4L2 capture device, picked by facing preference unless the
    /// constraints name one
    V4l2,
    /// Still images, served in turn on each frame request
    Images(Vec<PathBuf>),
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::V4l2
    }
}

/// Build the backend for a camera source
pub fn get_backend(source: &CameraSource) -> Arc<dyn CameraBackend> {
    match source {
        CameraSource::V4l2 => Arc::new(V4l2Camera::new()),
        CameraSource::Images(paths) => Arc::new(StillImageCamera::new(paths.clone())),
    }
}
