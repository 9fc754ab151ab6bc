// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Clerk — command-line front end.
//
// Entry point. Initialises logging, loads settings, and runs one of the
// detect / correct / scan commands against image files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clerk_camera::{CaptureSession, ReplayCamera};
use clerk_core::error::{ClerkError, Result};
use clerk_core::human_errors::humanize_error;
use clerk_core::{CorrectedImage, Orientation, Point, ScanConfig};
use clerk_document::{PerspectiveCorrector, QuadDetector};
use clerk_scan::ScanCoordinator;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "clerk")]
#[command(about = "Find documents in photos and straighten them")]
#[command(version)]
struct Cli {
    /// JSON settings file; missing fields take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized corners of the document in an image, as JSON.
    Detect {
        image: PathBuf,
    },

    /// Straighten an image with given corners, or detected ones.
    Correct {
        image: PathBuf,

        /// Pixel corners `x,y` in order top-left, top-right, bottom-right,
        /// bottom-left (8 numbers). Detected when omitted.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        corners: Option<Vec<f64>>,

        /// Output file; `.jpg`/`.jpeg` writes JPEG, anything else PNG.
        #[arg(long)]
        out: PathBuf,
    },

    /// Replay images as a live camera feed and take one scan.
    Scan {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// How long to wait for a document before shooting anyway.
        #[arg(long, default_value = "3000")]
        wait_ms: u64,

        #[arg(long)]
        out: PathBuf,
    },

    /// Write the default settings to a file.
    InitConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            tracing::debug!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    match cli.command {
        Commands::Detect { image } => detect(&config, &image),
        Commands::Correct {
            image,
            corners,
            out,
        } => correct(&config, &image, corners.as_deref(), &out),
        Commands::Scan {
            images,
            wait_ms,
            out,
        } => scan(config, &images, Duration::from_millis(wait_ms), &out).await,
        Commands::InitConfig { path } => {
            ScanConfig::default().save(&path)?;
            info!(path = %path.display(), "Default settings written");
            Ok(())
        }
    }
}

fn open_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).map_err(|err| {
        ClerkError::ImageError(format!("failed to open {}: {}", path.display(), err))
    })
}

fn detect(config: &ScanConfig, path: &Path) -> Result<()> {
    let img = open_image(path)?;
    let detector = QuadDetector::new(config.detector.clone());
    let quad = detector.detect_still(&img);
    if quad.is_none() {
        info!(path = %path.display(), "No document found");
    }
    println!("{}", serde_json::to_string_pretty(&quad)?);
    Ok(())
}

fn correct(config: &ScanConfig, path: &Path, corners: Option<&[f64]>, out: &Path) -> Result<()> {
    let img = open_image(path)?;
    let corners: Vec<Point> = match corners {
        Some(values) => parse_corners(values)?,
        None => {
            let detector = QuadDetector::new(config.detector.clone());
            let quad = detector.detect_still(&img).ok_or_else(|| {
                ClerkError::DegenerateQuad("no document found; pass --corners".into())
            })?;
            quad.to_pixel(img.width(), img.height()).corners.to_vec()
        }
    };

    let corrector = PerspectiveCorrector::new(&config.enhancement);
    let corrected = corrector.correct(&img, &corners, Orientation::Up, 1.0)?;
    write_output(&corrected, out)
}

/// Pair up `--corners` values into points.
fn parse_corners(values: &[f64]) -> Result<Vec<Point>> {
    if values.len() % 2 != 0 {
        return Err(ClerkError::Config(format!(
            "--corners takes x,y pairs; got {} values",
            values.len()
        )));
    }
    if values.len() != 8 {
        return Err(ClerkError::InvalidCorners(values.len() / 2));
    }
    Ok(values
        .chunks_exact(2)
        .map(|xy| Point::new(xy[0], xy[1]))
        .collect())
}

async fn scan(config: ScanConfig, images: &[PathBuf], wait: Duration, out: &Path) -> Result<()> {
    let camera = Arc::new(ReplayCamera::from_paths(images)?);
    let session = Arc::new(CaptureSession::new(camera, config.camera.clone()));
    let coordinator = ScanCoordinator::new(session, config);

    coordinator.start();
    coordinator.session().wait_until_running().await?;

    let mut detection = coordinator.subscribe_detection();
    if tokio::time::timeout(wait, detection.wait_for(|d| d.quad.is_some()))
        .await
        .is_err()
    {
        warn!(waited_ms = wait.as_millis() as u64, "No document detected; shooting uncorrected");
    }

    let result = coordinator.capture().await;
    coordinator.stop();
    let corrected = result?;
    write_output(&corrected, out)
}

fn write_output(image: &CorrectedImage, out: &Path) -> Result<()> {
    let jpeg = out
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
    let bytes = if jpeg {
        image.to_jpeg_bytes(90)?
    } else {
        image.to_png_bytes()?
    };
    std::fs::write(out, bytes)?;
    info!(
        path = %out.display(),
        width = image.width(),
        height = image.height(),
        rectified = image.rectified,
        passes = ?image.passes_applied,
        "Scan written"
    );
    Ok(())
}
