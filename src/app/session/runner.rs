// SPDX-License-Identifier: GPL-3.0-only

//! Body of one scan session
//!
//! A session is a single task. The stream handle, the poll interval and the
//! deadline all live on this task's stack, and the poll loop is the only
//! place that waits on them, so a session resolves exactly once and its
//! timers disappear with it. The stream is stopped in one place, after the
//! loop, before the outcome is published.

use super::Shared;
use super::types::*;
use crate::backends::camera::StreamHandle;
use crate::backends::detector::{BarcodeDetector, BarcodeFormat, DetectorConfig};
use crate::errors::ScanError;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub(super) async fn run_session(
    shared: Arc<Shared>,
    id: SessionId,
    started_at: DateTime<Local>,
    formats: Vec<BarcodeFormat>,
    mut cancel: oneshot::Receiver<()>,
) -> ScanOutcome {
    info!(session = %id, "Scan session started");
    shared.emit(id, ScanEventKind::Started { started_at });

    let acquired = tokio::select! {
        biased;
        _ = &mut cancel => None,
        result = shared.camera.request_video_stream(&shared.settings.constraints) => Some(result),
    };

    let mut stream = match acquired {
        None => {
            info!(session = %id, "Session cancelled while acquiring camera");
            return shared.finish(id, ScanOutcome::Cancelled);
        }
        Some(Err(e)) => {
            warn!(session = %id, error = %e, "Camera acquisition failed");
            return shared.finish(id, ScanOutcome::Failed(ScanError::Acquisition(e)));
        }
        Some(Ok(stream)) => stream,
    };

    let device = stream.device().name.clone();
    info!(session = %id, device = %device, "Camera stream started");
    shared.emit(id, ScanEventKind::StreamStarted { device });

    let config = DetectorConfig {
        formats,
        max_dimension: shared.settings.max_dimension,
    };
    let outcome = match shared.detectors.create_detector(&config) {
        Ok(detector) => poll(&shared, id, stream.as_ref(), detector.as_ref(), &mut cancel).await,
        Err(e) => {
            warn!(session = %id, error = %e, "Failed to create detector");
            ScanOutcome::Failed(ScanError::Detector(e))
        }
    };

    stream.stop().await;
    shared.clear_preview();
    shared.finish(id, outcome)
}

/// Poll the detector until something ends the session
///
/// That is a detection, the deadline, too many poll failures, a lost camera
/// stream, or cancellation.
async fn poll(
    shared: &Shared,
    id: SessionId,
    stream: &dyn StreamHandle,
    detector: &dyn BarcodeDetector,
    cancel: &mut oneshot::Receiver<()>,
) -> ScanOutcome {
    let timing = shared.settings.timing;
    let deadline = tokio::time::sleep(timing.timeout);
    tokio::pin!(deadline);

    // interval_at panics on a zero period
    let period = timing.poll_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut polls: u32 = 0;
    let mut consecutive_failures: u32 = 0;

    loop {
        // Deadline before tick: a poll due at the deadline does not run
        tokio::select! {
            biased;
            _ = &mut *cancel => {
                info!(session = %id, polls, "Session cancelled");
                return ScanOutcome::Cancelled;
            }
            _ = &mut deadline => {
                info!(session = %id, polls, "Scan timed out");
                return ScanOutcome::Failed(ScanError::Timeout);
            }
            _ = ticker.tick() => {}
        }

        if let Err(e) = stream.health() {
            warn!(session = %id, error = %e, polls, "Camera stream lost");
            return ScanOutcome::Failed(ScanError::StreamLost(e));
        }

        let Some(frame) = stream.current_frame() else {
            trace!(session = %id, "No frame yet");
            continue;
        };
        shared.publish_preview(Arc::clone(&frame));
        polls += 1;

        // A detect call still running at the deadline is abandoned
        let polled = tokio::select! {
            biased;
            _ = &mut *cancel => {
                info!(session = %id, polls, "Session cancelled during detection");
                return ScanOutcome::Cancelled;
            }
            _ = &mut deadline => {
                info!(session = %id, polls, "Scan timed out during detection");
                return ScanOutcome::Failed(ScanError::Timeout);
            }
            result = detector.detect(frame) => result,
        };

        match polled {
            Ok(mut detections) => {
                let count = detections.len();
                // Several codes in one frame: the last one reported wins
                if let Some(last) = detections.pop() {
                    info!(
                        session = %id,
                        polls,
                        count,
                        format = %last.format,
                        "Barcode detected"
                    );
                    return ScanOutcome::Completed(last);
                }
                debug!(session = %id, polls, "Nothing detected");
                consecutive_failures = 0;
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    session = %id,
                    error = %e,
                    consecutive_failures,
                    "Detector poll failed"
                );
                if consecutive_failures >= timing.max_consecutive_poll_failures {
                    return ScanOutcome::Failed(ScanError::Detector(e));
                }
            }
        }
    }
}
