// SPDX-License-Identifier: GPL-3.0-only

use barcode_scan::backends::camera::CameraSource;
use barcode_scan::config::Config;
use barcode_scan::constants::APP_DIR_NAME;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scan")]
#[command(about = "Read a barcode from a camera feed")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive terminal scanner (default)
    Terminal {
        /// Scan these image files instead of a camera
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// V4L2 device path (e.g. /dev/video0)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// List the barcode formats the detector supports
    Formats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan once and print the decoded value
    Scan {
        /// Scan these image files instead of a camera
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// V4L2 device path (e.g. /dev/video0)
        #[arg(short, long)]
        device: Option<String>,

        /// Give up after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Copy the decoded value to the clipboard
        #[arg(long)]
        copy: bool,

        /// Open the decoded value if it is a link
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Formats { json }) => {
            init_logging(None);
            cli::list_formats(json)
        }
        Some(Commands::Scan {
            images,
            device,
            timeout_ms,
            json,
            copy,
            open,
        }) => {
            init_logging(None);
            cli::scan(cli::ScanArgs {
                images,
                device,
                timeout_ms,
                json,
                copy,
                open,
            })
        }
        Some(Commands::Terminal { images, device }) => run_terminal(images, device),
        None => run_terminal(Vec::new(), None),
    }
}

fn run_terminal(images: Vec<PathBuf>, device: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    // Log lines would tear the interface, so they go to a file
    let log_path = dirs::cache_dir().map(|dir| dir.join(APP_DIR_NAME).join("barcode-scan.log"));
    init_logging(log_path);

    let mut config = Config::load()?;
    if device.is_some() {
        config.camera_device = device;
    }
    let source = if images.is_empty() {
        CameraSource::V4l2
    } else {
        CameraSource::Images(images)
    };

    barcode_scan::terminal::run(config, source)
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level.
/// Examples: RUST_LOG=debug, RUST_LOG=barcode_scan=debug, RUST_LOG=info
fn init_logging(log_file: Option<PathBuf>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init(),
    }
}
