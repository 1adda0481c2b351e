// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the scan session controller
//!
//! Timing tests run on tokio's paused clock, so a 15 second session takes no
//! wall time and every poll lands on an exact instant.

mod common;

use barcode_scan::app::{ScanEventKind, ScanOutcome, SessionState};
use barcode_scan::backends::camera::BackendError;
use barcode_scan::backends::detector::{BarcodeFormat, DetectorError};
use barcode_scan::errors::ScanError;
use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn finished(events: &[barcode_scan::app::ScanEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e.kind, ScanEventKind::Finished(_)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_completes_with_last_detection_of_first_hit() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::new(vec![vec![
        Poll::Empty,
        Poll::Empty,
        Poll::Found(vec!["first", "second", "last"]),
        Poll::Found(vec!["never"]),
    ]]));
    let (controller, mut events) = controller(camera.clone(), detectors.clone());

    let start = Instant::now();
    let id = controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    let ScanOutcome::Completed(result) = outcome else {
        panic!("expected completion, got {:?}", outcome);
    };
    assert_eq!(result.raw_value, "last");
    assert_eq!(result.format, BarcodeFormat::QrCode);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(detectors.polls(), 3);

    assert_eq!(camera.stats.acquired(), 1);
    assert_eq!(camera.stats.stopped(), 1);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.id, Some(id));
    assert_eq!(snapshot.state, SessionState::Completed);

    let events = drain(&mut events);
    assert!(events.iter().all(|e| e.session == id));
    assert!(matches!(events[0].kind, ScanEventKind::Started { .. }));
    assert!(matches!(events[1].kind, ScanEventKind::StreamStarted { .. }));
    assert_eq!(finished(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_with_single_release() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::new(Vec::new()));
    let (controller, mut events) = controller(camera.clone(), detectors.clone());

    let start = Instant::now();
    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert!(matches!(outcome, ScanOutcome::Failed(ScanError::Timeout)));
    assert_eq!(outcome.state(), SessionState::TimedOut);
    assert_eq!(
        outcome.error().map(|e| e.to_string()).as_deref(),
        Some("Barcode Not Detected or Format Not Supported")
    );
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    // The poll due at the deadline does not run
    assert_eq!(detectors.polls(), 14);
    assert_eq!(camera.stats.stopped(), 1);
    assert_eq!(controller.snapshot().state, SessionState::TimedOut);

    // Nothing fires after the session resolved
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(detectors.polls(), 14);
    assert_eq!(camera.stats.stopped(), 1);
    assert_eq!(finished(&drain(&mut events)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_session_timers_do_not_leak() {
    let camera = Arc::new(FakeCamera::new());
    // First session never detects; second detects on its first poll
    let detectors = Arc::new(ScriptedBackend::new(vec![
        Vec::new(),
        vec![Poll::Found(vec!["fresh"])],
    ]));
    let (controller, mut events) = controller(camera.clone(), detectors.clone());

    let first = controller.start_scan().await;
    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert_eq!(detectors.polls(), 9);

    let second = controller.start_scan().await;
    assert_ne!(first, second);
    // The first stream was released before the second was acquired
    assert_eq!(camera.stats.stopped(), 1);
    assert_eq!(camera.stats.max_open(), 1);

    let outcome = controller.wait().await.expect("session in slot");
    assert_eq!(outcome.result().map(|r| r.raw_value.as_str()), Some("fresh"));

    // Past the first session's original deadline
    tokio::time::sleep(Duration::from_secs(20)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.id, Some(second));
    assert_eq!(snapshot.state, SessionState::Completed);
    assert_eq!(camera.stats.acquired(), 2);
    assert_eq!(camera.stats.stopped(), 2);
    assert_eq!(detectors.polls(), 10);

    let events = drain(&mut events);
    let finished_sessions: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.kind, ScanEventKind::Finished(_)))
        .map(|e| e.session)
        .collect();
    assert_eq!(finished_sessions, vec![second]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_camera_and_goes_idle() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::new(Vec::new()));
    let (controller, mut events) = controller(camera.clone(), detectors.clone());

    controller.start_scan().await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let outcome = controller.cancel_scan().await;
    assert!(matches!(outcome, Some(ScanOutcome::Cancelled)));
    assert_eq!(camera.stats.stopped(), 1);
    assert_eq!(controller.snapshot().state, SessionState::Idle);

    let polls = detectors.polls();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(detectors.polls(), polls);
    assert_eq!(camera.stats.stopped(), 1);
    assert_eq!(finished(&drain(&mut events)), 0);

    // Slot is empty now
    assert!(controller.cancel_scan().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_failure_is_reported_verbatim() {
    let camera = Arc::new(FakeCamera::failing(BackendError::PermissionDenied(
        "Permission denied".to_string(),
    )));
    let detectors = Arc::new(ScriptedBackend::new(Vec::new()));
    let (controller, _events) = controller(camera.clone(), detectors.clone());

    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert_eq!(outcome.state(), SessionState::Failed);
    assert_eq!(
        outcome.error().map(|e| e.to_string()).as_deref(),
        Some("Permission denied")
    );
    assert_eq!(camera.stats.stopped(), 0);
    assert_eq!(detectors.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_fails_next_scan_after_release() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::probe_failing());
    let (controller, _events) = controller(camera.clone(), detectors.clone());

    assert!(controller.probe_formats().await.is_empty());
    assert!(controller.formats().is_probed());

    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert!(matches!(
        outcome,
        ScanOutcome::Failed(ScanError::Detector(DetectorError::NoFormats))
    ));
    assert_eq!(camera.stats.acquired(), 1);
    assert_eq!(camera.stats.stopped(), 1);
    // Probed once, not retried by the scan
    assert_eq!(detectors.probes.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_poll_failures_fail_session() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::new(vec![vec![
        Poll::Error,
        Poll::Error,
        Poll::Error,
    ]]));
    let (controller, _events) = controller(camera.clone(), detectors.clone());

    let start = Instant::now();
    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert!(matches!(outcome, ScanOutcome::Failed(ScanError::Detector(_))));
    assert_eq!(outcome.state(), SessionState::Failed);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(camera.stats.stopped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_streak_resets_on_success() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::new(vec![vec![
        Poll::Error,
        Poll::Error,
        Poll::Empty,
        Poll::Error,
        Poll::Error,
        Poll::Found(vec!["ok"]),
    ]]));
    let (controller, _events) = controller(camera.clone(), detectors.clone());

    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert_eq!(outcome.result().map(|r| r.raw_value.as_str()), Some("ok"));
}

#[tokio::test(start_paused = true)]
async fn test_no_frames_means_no_polls() {
    let camera = Arc::new(FakeCamera::without_frames());
    let detectors = Arc::new(ScriptedBackend::new(Vec::new()));
    let (controller, _events) = controller(camera.clone(), detectors.clone());

    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert_eq!(outcome.state(), SessionState::TimedOut);
    assert_eq!(detectors.polls(), 0);
    assert_eq!(camera.stats.stopped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_detection_abandoned_at_deadline() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(
        ScriptedBackend::new(vec![vec![Poll::Empty, Poll::Found(vec!["late"])]])
            .with_delay(Duration::from_secs(10)),
    );
    let (controller, _events) = controller(camera.clone(), detectors.clone());

    let start = Instant::now();
    controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert_eq!(outcome.state(), SessionState::TimedOut);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert_eq!(camera.stats.stopped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_lost_stream_fails_session_with_device_error() {
    let camera = Arc::new(FakeCamera::dropping_out(Duration::from_millis(2_500)));
    let detectors = Arc::new(ScriptedBackend::new(Vec::new()));
    let (controller, mut events) = controller(camera.clone(), detectors.clone());

    let start = Instant::now();
    let id = controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert!(matches!(outcome, ScanOutcome::Failed(ScanError::StreamLost(_))));
    assert_eq!(outcome.state(), SessionState::Failed);
    assert_eq!(
        outcome.error().map(|e| e.to_string()).as_deref(),
        Some(DISCONNECTED)
    );
    // Fails at the first tick after the drop out instead of at the deadline
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(detectors.polls(), 2);
    assert_eq!(camera.stats.stopped(), 1);
    assert_eq!(controller.snapshot().state, SessionState::Failed);

    let events = drain(&mut events);
    assert!(events.iter().all(|e| e.session == id));
    assert_eq!(finished(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicked_session_is_reported_as_failure() {
    let camera = Arc::new(FakeCamera::new());
    let detectors = Arc::new(ScriptedBackend::new(vec![vec![Poll::Panic]]));
    let (controller, mut events) = controller(camera.clone(), detectors.clone());

    let id = controller.start_scan().await;
    let outcome = controller.wait().await.expect("session in slot");

    assert!(matches!(outcome, ScanOutcome::Failed(ScanError::Aborted(_))));
    assert_eq!(outcome.state(), SessionState::Failed);
    assert!(
        outcome
            .error()
            .is_some_and(|e| e.to_string().starts_with("Scan stopped unexpectedly"))
    );
    assert_eq!(controller.snapshot().state, SessionState::Failed);

    let events = drain(&mut events);
    let last = events.last().expect("events emitted");
    assert_eq!(last.session, id);
    assert!(matches!(
        last.kind,
        ScanEventKind::Finished(ScanOutcome::Failed(ScanError::Aborted(_)))
    ));

    // The slot is free again
    assert!(controller.wait().await.is_none());
}

/// Expected outcome of a scripted session, polls landing at 1s..14s
fn model(script: &[Poll]) -> Result<&'static str, bool> {
    let mut failures = 0;
    for poll in script.iter().take(14) {
        match poll {
            Poll::Found(values) if !values.is_empty() => return Ok(values[values.len() - 1]),
            Poll::Found(_) | Poll::Empty => failures = 0,
            Poll::Error => {
                failures += 1;
                if failures == 3 {
                    // Failed
                    return Err(false);
                }
            }
            Poll::Panic => unreachable!("panics are not generated"),
        }
    }
    // Timed out
    Err(true)
}

fn poll_strategy() -> impl Strategy<Value = Poll> {
    prop_oneof![
        6 => Just(Poll::Empty),
        2 => Just(Poll::Error),
        1 => prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 0..4)
            .prop_map(Poll::Found),
    ]
}

proptest! {
    #[test]
    fn prop_session_matches_poll_model(script in prop::collection::vec(poll_strategy(), 0..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let expected = model(&script);
        let camera = Arc::new(FakeCamera::new());
        let detectors = Arc::new(ScriptedBackend::new(vec![script]));

        let outcome = runtime.block_on(async {
            let (controller, _events) = controller(camera.clone(), detectors.clone());
            controller.start_scan().await;
            controller.wait().await.expect("session in slot")
        });

        match expected {
            Ok(value) => {
                prop_assert_eq!(outcome.result().map(|r| r.raw_value.as_str()), Some(value));
            }
            Err(true) => prop_assert_eq!(outcome.state(), SessionState::TimedOut),
            Err(false) => prop_assert_eq!(outcome.state(), SessionState::Failed),
        }
        prop_assert_eq!(camera.stats.acquired(), 1);
        prop_assert_eq!(camera.stats.stopped(), 1);
    }
}
