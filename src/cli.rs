// SPDX-License-Identifier: GPL-3.0-only

//! Headless commands
//!
//! This module provides command-line functionality for:
//! - Listing the barcode formats the detector supports
//! - Running a single scan without the terminal interface

use barcode_scan::app::{
    DesktopActions, FormatRegistry, ScanController, ScanEventKind, ScanOutcome, SystemActions,
    ValueKind,
};
use barcode_scan::backends::camera::{CameraSource, get_backend};
use barcode_scan::backends::detector::{self, DetectionResult};
use barcode_scan::config::Config;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Options of the `scan` command
pub struct ScanArgs {
    pub images: Vec<PathBuf>,
    pub device: Option<String>,
    pub timeout_ms: Option<u64>,
    pub json: bool,
    pub copy: bool,
    pub open: bool,
}

#[derive(Serialize)]
struct FormatsReport<'a> {
    detector: String,
    formats: &'a [detector::BarcodeFormat],
}

#[derive(Serialize)]
struct ScanReport<'a> {
    #[serde(flatten)]
    result: &'a DetectionResult,
    link: bool,
}

/// Print the formats the selected detector supports
pub fn list_formats(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(print_formats(config, json))
}

async fn print_formats(config: Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let backend = detector::select(config.detector);
    let registry = FormatRegistry::new();
    let formats = registry.probe(backend.as_ref()).await;

    if json {
        let report = FormatsReport {
            detector: backend.kind().to_string(),
            formats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if formats.is_empty() {
        println!("No supported barcode formats.");
        return Ok(());
    }

    println!("Supported formats ({} detector):", backend.kind());
    println!();
    for format in formats {
        println!("  {}", format);
    }
    Ok(())
}

/// Scan once and print the decoded value
pub fn scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if args.device.is_some() {
        config.camera_device = args.device.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_scan(config, args))
}

async fn run_scan(config: Config, args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = if args.images.is_empty() {
        CameraSource::V4l2
    } else {
        CameraSource::Images(args.images.clone())
    };

    let (controller, mut events) = ScanController::new(
        get_backend(&source),
        detector::select(config.detector),
        Arc::new(FormatRegistry::new()),
        config.session_settings(),
    );

    // Set up Ctrl+C handler
    let (interrupt_tx, mut interrupts) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    let quiet = args.json;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if quiet {
                continue;
            }
            match event.kind {
                ScanEventKind::Started { .. } => eprintln!("Requesting camera..."),
                ScanEventKind::StreamStarted { device } => {
                    eprintln!("Scanning with {} (press Ctrl+C to cancel)", device)
                }
                ScanEventKind::Finished(_) => {}
            }
        }
    });

    controller.start_scan().await;

    let waited = tokio::select! {
        outcome = controller.wait() => outcome,
        _ = interrupts.recv() => None,
    };
    let outcome = match waited {
        Some(outcome) => outcome,
        None => {
            eprintln!("Cancelling...");
            controller
                .cancel_scan()
                .await
                .unwrap_or(ScanOutcome::Cancelled)
        }
    };

    match outcome {
        ScanOutcome::Completed(result) => report(&result, &args).await,
        ScanOutcome::Failed(e) => Err(e.into()),
        ScanOutcome::Cancelled => Err("Scan cancelled".into()),
    }
}

async fn report(result: &DetectionResult, args: &ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let kind = ValueKind::classify(&result.raw_value);

    if args.json {
        let report = ScanReport {
            result,
            link: kind == ValueKind::Link,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Format: {}", result.format);
        println!("{}", result.raw_value);
    }

    let actions = DesktopActions::new();
    if args.copy {
        actions.write_text(&result.raw_value).await?;
        eprintln!("Copied!");
    }
    if args.open {
        if kind == ValueKind::Link {
            actions.open_url(&result.raw_value)?;
        } else {
            eprintln!("Not a link, nothing to open");
        }
    }
    Ok(())
}
