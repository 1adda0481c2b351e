// SPDX-License-Identifier: GPL-3.0-only

//! Scan surface state
//!
//! [`ScanView`] is what the terminal interface draws. It changes in response
//! to user intents and to [`ScanEvent`]s from the session controller, and
//! only follows events of the session it is currently tracking.

use crate::app::error_presenter::ErrorPanel;
use crate::app::result_presenter::ResultPanel;
use crate::app::session::{ScanEvent, ScanEventKind, ScanOutcome, SessionId, SessionState};
use crate::backends::detector::BarcodeFormat;
use crate::constants::labels;
use chrono::{DateTime, Local};
use tracing::{debug, trace};

/// Everything shown on the scan surface
#[derive(Debug, Clone)]
pub struct ScanView {
    /// Label of the scan button
    pub scan_label: &'static str,
    /// Whether the live camera panel is shown
    pub video_visible: bool,
    /// Formats revealed so far in the format list
    pub formats: Vec<BarcodeFormat>,
    pub result: Option<ResultPanel>,
    pub error: Option<ErrorPanel>,

    // ===== Session tracking =====
    /// Session whose events are applied
    pub session: Option<SessionId>,
    pub state: SessionState,
    pub started_at: Option<DateTime<Local>>,
    /// Name of the streaming camera
    pub device: Option<String>,
}

impl Default for ScanView {
    fn default() -> Self {
        Self {
            scan_label: labels::SCAN_IDLE,
            video_visible: false,
            formats: Vec::new(),
            result: None,
            error: None,
            session: None,
            state: SessionState::Idle,
            started_at: None,
            device: None,
        }
    }
}

impl ScanView {
    /// Clear the previous outcome before a new scan
    pub fn begin_scan(&mut self) {
        self.result = None;
        self.error = None;
        self.video_visible = true;
    }

    /// Follow `id` from now on; events of any other session are ignored
    pub fn track(&mut self, id: SessionId) {
        self.session = Some(id);
        self.state = SessionState::Scanning;
        self.device = None;
    }

    /// Back to the idle surface after a cancel
    pub fn reset_idle(&mut self) {
        self.state = SessionState::Idle;
        self.video_visible = false;
        self.scan_label = labels::SCAN_IDLE;
        self.started_at = None;
        self.device = None;
    }

    /// Append one revealed format
    pub fn reveal_format(&mut self, format: BarcodeFormat) {
        self.formats.push(format);
    }

    /// Apply a session event
    ///
    /// Returns `false` without touching the view when the event belongs to
    /// a session other than the tracked one.
    pub fn apply(&mut self, event: &ScanEvent) -> bool {
        if self.session != Some(event.session) {
            trace!(session = %event.session, "Ignoring event from stale session");
            return false;
        }

        match &event.kind {
            ScanEventKind::Started { started_at } => {
                self.state = SessionState::Scanning;
                self.started_at = Some(*started_at);
                self.video_visible = true;
            }
            ScanEventKind::StreamStarted { device } => {
                self.device = Some(device.clone());
                self.scan_label = labels::SCAN_ACTIVE;
            }
            ScanEventKind::Finished(outcome) => {
                debug!(session = %event.session, state = ?outcome.state(), "Applying outcome");
                self.state = outcome.state();
                self.video_visible = false;
                self.scan_label = labels::SCAN_IDLE;
                self.device = None;
                match outcome {
                    ScanOutcome::Completed(result) => {
                        self.result = Some(ResultPanel::present(result));
                    }
                    ScanOutcome::Failed(e) => ErrorPanel::present(self, e.to_string()),
                    ScanOutcome::Cancelled => {}
                }
            }
        }
        true
    }

    /// Seconds since the tracked session started, while scanning
    pub fn elapsed_secs(&self) -> Option<i64> {
        if !self.state.is_scanning() {
            return None;
        }
        self.started_at
            .map(|started| (Local::now() - started).num_seconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::detector::DetectionResult;
    use crate::errors::ScanError;

    fn event(session: SessionId, kind: ScanEventKind) -> ScanEvent {
        ScanEvent { session, kind }
    }

    #[test]
    fn test_lifecycle_labels() {
        let id = SessionId::new();
        let mut view = ScanView::default();
        view.begin_scan();
        view.track(id);

        view.apply(&event(id, ScanEventKind::Started { started_at: Local::now() }));
        assert_eq!(view.scan_label, "Scan Barcode");

        view.apply(&event(id, ScanEventKind::StreamStarted { device: "cam".into() }));
        assert_eq!(view.scan_label, "Scanning...");
        assert!(view.video_visible);

        let result = DetectionResult::new("12345", BarcodeFormat::Ean13);
        view.apply(&event(
            id,
            ScanEventKind::Finished(ScanOutcome::Completed(result)),
        ));
        assert_eq!(view.state, SessionState::Completed);
        assert_eq!(view.scan_label, "Scan Barcode");
        assert!(!view.video_visible);
        assert_eq!(view.result.as_ref().map(|r| r.action_label), Some("Copy"));
    }

    #[test]
    fn test_stale_events_ignored() {
        let old = SessionId::new();
        let new = SessionId::new();
        let mut view = ScanView::default();
        view.track(new);

        let applied = view.apply(&event(
            old,
            ScanEventKind::Finished(ScanOutcome::Failed(ScanError::Timeout)),
        ));

        assert!(!applied);
        assert_eq!(view.state, SessionState::Scanning);
        assert!(view.error.is_none());
    }

    #[test]
    fn test_begin_scan_clears_outcome() {
        let mut view = ScanView::default();
        ErrorPanel::present(&mut view, "boom");
        view.begin_scan();
        assert!(view.error.is_none());
        assert!(view.result.is_none());
        assert!(view.video_visible);
    }
}
