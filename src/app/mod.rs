// SPDX-License-Identifier: MPL-2.0

//! Scan application
//!
//! This module contains the scan lifecycle and the state the user interface
//! draws from it.
//!
//! # Architecture
//!
//! - `probe`: Supported format probe and the staggered format list reveal
//! - `session`: Single-slot session controller (acquire, poll, resolve, release)
//! - `state`: Scan surface state updated from session events
//! - `result_presenter`: Result panel and its copy/open action
//! - `error_presenter`: Error panel
//! - `actions`: Clipboard and URL integration
//!
//! # Main Types
//!
//! - `ScanApp`: Ties the controller, the surface state and the desktop actions together
//! - `ScanController`: Owns the session slot
//! - `ScanView`: What the terminal interface renders

pub mod actions;
pub mod error_presenter;
pub mod probe;
pub mod result_presenter;
pub mod session;
pub mod state;

pub use actions::{DesktopActions, SystemActions};
pub use error_presenter::ErrorPanel;
pub use probe::{FormatRegistry, staggered_reveal};
pub use result_presenter::{ActionPerformed, ResultPanel, ValueKind};
pub use session::{
    ScanController, ScanEvent, ScanEventKind, ScanOutcome, ScanTiming, SessionId,
    SessionSettings, SessionSnapshot, SessionState,
};
pub use state::ScanView;

use crate::backends::detector::BarcodeFormat;
use crate::errors::ActionError;
use std::sync::Arc;
use tracing::{debug, info};

/// Scan surface driven by user intents and session events
pub struct ScanApp {
    controller: Arc<ScanController>,
    actions: Arc<dyn SystemActions>,
    pub view: ScanView,
}

impl ScanApp {
    pub fn new(controller: Arc<ScanController>, actions: Arc<dyn SystemActions>) -> Self {
        Self {
            controller,
            actions,
            view: ScanView::default(),
        }
    }

    pub fn controller(&self) -> &Arc<ScanController> {
        &self.controller
    }

    /// Probe supported formats; the list is revealed separately
    pub async fn load_formats(&self) -> Vec<BarcodeFormat> {
        self.controller.probe_formats().await.to_vec()
    }

    pub fn reveal_format(&mut self, format: BarcodeFormat) {
        self.view.reveal_format(format);
    }

    /// Scan button
    pub async fn start_scan(&mut self) -> SessionId {
        self.view.begin_scan();
        let id = self.controller.start_scan().await;
        self.view.track(id);
        info!(session = %id, "Scan requested");
        id
    }

    /// Cancel key
    pub async fn cancel_scan(&mut self) -> Option<ScanOutcome> {
        let outcome = self.controller.cancel_scan().await;
        if matches!(outcome, Some(ScanOutcome::Cancelled)) {
            self.view.reset_idle();
        }
        outcome
    }

    pub fn handle_event(&mut self, event: &ScanEvent) -> bool {
        self.view.apply(event)
    }

    /// Action button of the result panel
    ///
    /// Returns `None` when no result is shown.
    pub async fn perform_action(&mut self) -> Option<Result<ActionPerformed, ActionError>> {
        let panel = self.view.result.as_mut()?;
        let performed = panel.perform_action(self.actions.as_ref()).await;
        debug!(?performed, label = panel.action_label, "Result action handled");
        Some(performed)
    }
}
