// SPDX-License-Identifier: GPL-3.0-only

//! Scan session controller
//!
//! [`ScanController`] owns a single session slot. Starting a scan while one
//! is running cancels the running session and waits for it to release its
//! camera before anything else happens. Both steps run under the slot lock,
//! so two overlapping `start_scan` calls cannot interleave.
//!
//! Progress is reported three ways:
//!
//! - [`ScanEvent`]s on the channel returned by [`ScanController::new`]
//! - a [`SessionSnapshot`], read with [`ScanController::snapshot`]
//! - the most recent polled frame on the preview watch channel

mod runner;
pub mod types;

pub use types::*;

use crate::app::probe::FormatRegistry;
use crate::backends::camera::{CameraBackend, CameraFrame};
use crate::backends::detector::{BarcodeFormat, DetectorBackend};
use crate::errors::ScanError;
use chrono::Local;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// State shared between the controller and its session tasks
pub(crate) struct Shared {
    camera: Arc<dyn CameraBackend>,
    detectors: Arc<dyn DetectorBackend>,
    settings: SessionSettings,
    snapshot: watch::Sender<SessionSnapshot>,
    preview: watch::Sender<Option<Arc<CameraFrame>>>,
    events: mpsc::UnboundedSender<ScanEvent>,
}

impl Shared {
    fn emit(&self, session: SessionId, kind: ScanEventKind) {
        // Nobody listening is fine (headless callers only await the outcome)
        let _ = self.events.send(ScanEvent { session, kind });
    }

    fn publish_preview(&self, frame: Arc<CameraFrame>) {
        self.preview.send_replace(Some(frame));
    }

    fn clear_preview(&self) {
        self.preview.send_replace(None);
    }

    /// Record a session's outcome
    ///
    /// The snapshot only changes while `id` still owns it. Cancelled
    /// sessions emit nothing further.
    fn finish(&self, id: SessionId, outcome: ScanOutcome) -> ScanOutcome {
        let state = outcome.state();
        let owned = self.snapshot.send_if_modified(|snapshot| {
            if snapshot.id == Some(id) {
                snapshot.state = state;
                true
            } else {
                false
            }
        });
        if !owned {
            debug!(session = %id, "Session no longer owns the snapshot");
        }

        if !matches!(outcome, ScanOutcome::Cancelled) {
            self.emit(id, ScanEventKind::Finished(outcome.clone()));
        }
        info!(session = %id, ?state, "Scan session finished");
        outcome
    }
}

/// The session occupying the slot
struct ActiveSession {
    id: SessionId,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<ScanOutcome>,
}

impl ActiveSession {
    /// Signal the session and wait until it has released everything
    async fn shutdown(mut self, shared: &Shared) -> ScanOutcome {
        if let Some(cancel) = self.cancel.take() {
            // Fails only when the session already resolved on its own
            let _ = cancel.send(());
        }
        let joined = (&mut self.task).await;
        resolve(shared, self.id, joined)
    }
}

/// Outcome of a joined session task
///
/// A task that panicked never published an outcome, so it is reported here
/// as a failure.
fn resolve(shared: &Shared, id: SessionId, joined: Result<ScanOutcome, JoinError>) -> ScanOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(session = %id, error = %e, "Scan session task failed");
            shared.finish(id, ScanOutcome::Failed(ScanError::Aborted(e.to_string())))
        }
    }
}

/// Single-slot scan session controller
pub struct ScanController {
    shared: Arc<Shared>,
    formats: Arc<FormatRegistry>,
    slot: Mutex<Option<ActiveSession>>,
}

impl ScanController {
    /// Create a controller and the receiving end of its event channel
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        detectors: Arc<dyn DetectorBackend>,
        formats: Arc<FormatRegistry>,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        let (preview, _) = watch::channel(None);

        info!(
            camera = camera.name(),
            detector = %detectors.kind(),
            poll_ms = settings.timing.poll_interval.as_millis(),
            timeout_ms = settings.timing.timeout.as_millis(),
            "Scan controller created"
        );

        let shared = Arc::new(Shared {
            camera,
            detectors,
            settings,
            snapshot,
            preview,
            events,
        });

        (
            Self {
                shared,
                formats,
                slot: Mutex::new(None),
            },
            receiver,
        )
    }

    /// Populate the format registry (once per registry)
    pub async fn probe_formats(&self) -> &[BarcodeFormat] {
        self.formats.probe(self.shared.detectors.as_ref()).await
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Start a new scan session
    ///
    /// A session already in the slot is cancelled and awaited first, so its
    /// camera is released and its timers are gone before the new session
    /// requests a stream.
    pub async fn start_scan(&self) -> SessionId {
        let formats = self.probe_formats().await.to_vec();

        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            info!(session = %previous.id, "Superseding running scan session");
            previous.shutdown(&self.shared).await;
        }

        let id = SessionId::new();
        let started_at = Local::now();
        self.shared.snapshot.send_replace(SessionSnapshot {
            id: Some(id),
            state: SessionState::Scanning,
            started_at: Some(started_at),
        });

        let (cancel, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(runner::run_session(
            Arc::clone(&self.shared),
            id,
            started_at,
            formats,
            cancel_rx,
        ));

        *slot = Some(ActiveSession {
            id,
            cancel: Some(cancel),
            task,
        });
        id
    }

    /// Cancel the session in the slot
    ///
    /// Returns `None` when the slot is empty. Otherwise the session's
    /// outcome, which is [`ScanOutcome::Cancelled`] unless the session had
    /// already resolved.
    pub async fn cancel_scan(&self) -> Option<ScanOutcome> {
        let active = self.slot.lock().await.take()?;
        info!(session = %active.id, "Cancelling scan session");
        Some(active.shutdown(&self.shared).await)
    }

    /// Wait for the session in the slot to resolve on its own
    ///
    /// Returns `None` when the slot is empty.
    pub async fn wait(&self) -> Option<ScanOutcome> {
        let mut slot = self.slot.lock().await;
        let active = slot.as_mut()?;
        let joined = (&mut active.task).await;
        let outcome = resolve(&self.shared, active.id, joined);
        *slot = None;
        Some(outcome)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Most recent frame handed to the detector, `None` between sessions
    pub fn preview(&self) -> watch::Receiver<Option<Arc<CameraFrame>>> {
        self.shared.preview.subscribe()
    }
}
