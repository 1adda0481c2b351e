// SPDX-License-Identifier: MPL-2.0

//! Test doubles for the camera, detector and desktop capabilities

#![allow(dead_code)]

use barcode_scan::app::actions::SystemActions;
use barcode_scan::app::{FormatRegistry, ScanController, ScanEvent, ScanTiming, SessionSettings};
use barcode_scan::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraDevice, CameraFrame, StreamConstraints,
    StreamHandle,
};
use barcode_scan::backends::detector::{
    BarcodeDetector, BarcodeFormat, DetectionResult, DetectorBackend, DetectorConfig,
    DetectorError, DetectorKind, DetectorResult,
};
use barcode_scan::errors::ActionError;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// =========================================================================
// Camera
// =========================================================================

/// Counts acquisitions and releases, and the most streams open at once
#[derive(Debug, Default)]
pub struct CameraStats {
    pub acquired: AtomicUsize,
    pub stopped: AtomicUsize,
    open: AtomicUsize,
    pub max_open: AtomicUsize,
}

impl CameraStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

pub struct FakeCamera {
    pub stats: Arc<CameraStats>,
    error: Option<BackendError>,
    has_frames: bool,
    drop_out_after: Option<Duration>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            stats: Arc::default(),
            error: None,
            has_frames: true,
            drop_out_after: None,
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            error: Some(error),
            ..Self::new()
        }
    }

    /// Streams that never deliver a frame
    pub fn without_frames() -> Self {
        Self {
            has_frames: false,
            ..Self::new()
        }
    }

    /// Streams whose device disappears `after` the stream started
    pub fn dropping_out(after: Duration) -> Self {
        Self {
            drop_out_after: Some(after),
            ..Self::new()
        }
    }
}

/// Message of a stream that dropped out
pub const DISCONNECTED: &str = "Camera disconnected";

impl CameraBackend for FakeCamera {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn request_video_stream<'a>(
        &'a self,
        _constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn StreamHandle>>> {
        Box::pin(async move {
            self.stats.acquired.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.error {
                return Err(error.clone());
            }

            let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.stats.max_open.fetch_max(open, Ordering::SeqCst);

            let frame = self
                .has_frames
                .then(|| Arc::new(CameraFrame::gray(8, 8, vec![128u8; 64])));
            Ok(Box::new(FakeStream {
                stats: Arc::clone(&self.stats),
                device: fake_device(),
                frame,
                active: true,
                drop_out_at: self
                    .drop_out_after
                    .map(|after| tokio::time::Instant::now() + after),
            }) as Box<dyn StreamHandle>)
        })
    }
}

fn fake_device() -> CameraDevice {
    CameraDevice {
        name: "Fake Camera".to_string(),
        path: "/dev/fake0".to_string(),
        index: 0,
    }
}

struct FakeStream {
    stats: Arc<CameraStats>,
    device: CameraDevice,
    frame: Option<Arc<CameraFrame>>,
    active: bool,
    drop_out_at: Option<tokio::time::Instant>,
}

impl FakeStream {
    fn dropped_out(&self) -> bool {
        self.drop_out_at
            .is_some_and(|at| tokio::time::Instant::now() >= at)
    }
}

impl StreamHandle for FakeStream {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        if self.active && !self.dropped_out() {
            self.frame.clone()
        } else {
            None
        }
    }

    fn stop(&mut self) -> BoxFuture<'_, ()> {
        // Every call is counted so double releases show up in tests
        self.stats.stopped.fetch_add(1, Ordering::SeqCst);
        if self.active {
            self.active = false;
            self.stats.open.fetch_sub(1, Ordering::SeqCst);
        }
        Box::pin(async {})
    }

    fn health(&self) -> BackendResult<()> {
        if self.dropped_out() {
            Err(BackendError::StreamFailed(DISCONNECTED.to_string()))
        } else {
            Ok(())
        }
    }
}

// =========================================================================
// Detector
// =========================================================================

/// Result of one scripted poll
#[derive(Debug, Clone)]
pub enum Poll {
    /// Poll returns these values as QR codes
    Found(Vec<&'static str>),
    Empty,
    Error,
    /// The detector panics mid-poll
    Panic,
}

/// Detector backend handing out scripted detectors
///
/// Each created detector takes the next script; polls beyond the end of a
/// script come back empty.
pub struct ScriptedBackend {
    formats: Option<Vec<BarcodeFormat>>,
    scripts: Mutex<VecDeque<Vec<Poll>>>,
    delay: Duration,
    pub probes: AtomicUsize,
    pub polls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(scripts: Vec<Vec<Poll>>) -> Self {
        Self {
            formats: Some(vec![BarcodeFormat::QrCode]),
            scripts: Mutex::new(scripts.into()),
            delay: Duration::ZERO,
            probes: AtomicUsize::new(0),
            polls: Arc::default(),
        }
    }

    /// Backend whose format probe fails
    pub fn probe_failing() -> Self {
        Self {
            formats: None,
            ..Self::new(Vec::new())
        }
    }

    /// Every detect call takes `delay` to finish
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl DetectorBackend for ScriptedBackend {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Fallback
    }

    fn supported_formats(&self) -> BoxFuture<'_, DetectorResult<Vec<BarcodeFormat>>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let formats = self.formats.clone();
        Box::pin(async move {
            formats.ok_or_else(|| DetectorError::DetectionFailed("probe failed".to_string()))
        })
    }

    fn create_detector(&self, config: &DetectorConfig) -> DetectorResult<Box<dyn BarcodeDetector>> {
        if config.formats.is_empty() {
            return Err(DetectorError::NoFormats);
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(ScriptedDetector {
            script: Mutex::new(script.into()),
            delay: self.delay,
            polls: Arc::clone(&self.polls),
        }))
    }
}

struct ScriptedDetector {
    script: Mutex<VecDeque<Poll>>,
    delay: Duration,
    polls: Arc<AtomicUsize>,
}

impl BarcodeDetector for ScriptedDetector {
    fn detect(&self, _frame: Arc<CameraFrame>) -> BoxFuture<'_, DetectorResult<Vec<DetectionResult>>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Poll::Empty);
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match next {
                Poll::Found(values) => Ok(values
                    .into_iter()
                    .map(|v| DetectionResult::new(v, BarcodeFormat::QrCode))
                    .collect()),
                Poll::Empty => Ok(Vec::new()),
                Poll::Error => Err(DetectorError::DetectionFailed("decoder crashed".to_string())),
                Poll::Panic => panic!("decoder panicked"),
            }
        })
    }
}

// =========================================================================
// Desktop actions
// =========================================================================

#[derive(Default)]
pub struct FakeActions {
    pub copied: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    pub fail_copy: bool,
}

impl FakeActions {
    pub fn copied(&self) -> Vec<String> {
        self.copied.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl SystemActions for FakeActions {
    fn write_text<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            self.copied.lock().unwrap().push(text.to_string());
            if self.fail_copy {
                Err(ActionError::ClipboardUnavailable("no clipboard".to_string()))
            } else {
                Ok(())
            }
        })
    }

    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

// =========================================================================
// Helpers
// =========================================================================

pub fn default_settings() -> SessionSettings {
    SessionSettings {
        timing: ScanTiming {
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_millis(15_000),
            max_consecutive_poll_failures: 3,
        },
        ..SessionSettings::default()
    }
}

pub fn controller(
    camera: Arc<FakeCamera>,
    detectors: Arc<ScriptedBackend>,
) -> (ScanController, mpsc::UnboundedReceiver<ScanEvent>) {
    ScanController::new(
        camera,
        detectors,
        Arc::new(FormatRegistry::new()),
        default_settings(),
    )
}

/// Events received so far
pub fn drain(events: &mut mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
