// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for the scan workflow tests: a camera driven step by step
// from the test body, and synthetic page images.

#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clerk_camera::{CameraDevice, CaptureSession, PhotoSettings};
use clerk_core::config::{CameraConfig, EnhancementConfig, ScanConfig};
use clerk_core::error::{ClerkError, Result};
use clerk_core::types::encode_png;
use clerk_core::{DetectionState, Frame, Orientation, ScanState, StillPhoto};
use clerk_scan::ScanCoordinator;
use image::{DynamicImage, Rgb, RgbImage};
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(10);

/// What the next still request should produce.
pub enum StillOutcome {
    Image(DynamicImage),
    Fail(String),
}

/// Camera whose frames and stills are fed by the test.
///
/// Frames pushed through [`CameraScript::push_frame`] are delivered in order.
/// A still request blocks until the test calls [`CameraScript::release`].
pub struct ScriptedCamera {
    frames: Mutex<Receiver<DynamicImage>>,
    stills: Mutex<Receiver<StillOutcome>>,
    still_requests: Mutex<Vec<PhotoSettings>>,
    torch: Mutex<bool>,
}

/// Test-side handle for a [`ScriptedCamera`].
#[derive(Clone)]
pub struct CameraScript {
    frames: Sender<DynamicImage>,
    stills: Sender<StillOutcome>,
    camera: Arc<ScriptedCamera>,
}

impl CameraScript {
    pub fn push_frame(&self, image: DynamicImage) {
        self.frames.send(image).expect("camera alive");
    }

    pub fn release(&self, outcome: StillOutcome) {
        self.stills.send(outcome).expect("camera alive");
    }

    pub fn still_requests(&self) -> Vec<PhotoSettings> {
        self.camera
            .still_requests
            .lock()
            .expect("requests")
            .clone()
    }

    pub fn torch_lit(&self) -> bool {
        *self.camera.torch.lock().expect("torch")
    }
}

pub fn scripted_camera() -> (Arc<ScriptedCamera>, CameraScript) {
    let (frame_tx, frame_rx) = mpsc::channel();
    let (still_tx, still_rx) = mpsc::channel();
    let camera = Arc::new(ScriptedCamera {
        frames: Mutex::new(frame_rx),
        stills: Mutex::new(still_rx),
        still_requests: Mutex::new(Vec::new()),
        torch: Mutex::new(false),
    });
    let script = CameraScript {
        frames: frame_tx,
        stills: still_tx,
        camera: Arc::clone(&camera),
    };
    (camera, script)
}

impl CameraDevice for ScriptedCamera {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}

    fn next_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        let rx = self
            .frames
            .lock()
            .map_err(|_| ClerkError::Capture("frames poisoned".into()))?;
        match rx.recv_timeout(timeout) {
            Ok(image) => Ok(Some(Frame::new(image, Orientation::Up))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn capture_still(&self, settings: &PhotoSettings) -> Result<StillPhoto> {
        if let Ok(mut requests) = self.still_requests.lock() {
            requests.push(*settings);
        }
        let rx = self
            .stills
            .lock()
            .map_err(|_| ClerkError::Capture("stills poisoned".into()))?;
        match rx.recv_timeout(WAIT) {
            Ok(StillOutcome::Image(image)) => {
                Ok(StillPhoto::new(encode_png(&image)?, Orientation::Up))
            }
            Ok(StillOutcome::Fail(reason)) => Err(ClerkError::Capture(reason)),
            Err(_) => Err(ClerkError::Capture("test never released the still".into())),
        }
    }

    fn has_torch(&self) -> bool {
        true
    }

    fn set_torch(&self, on: bool) -> Result<()> {
        let mut torch = self
            .torch
            .lock()
            .map_err(|_| ClerkError::Torch("torch poisoned".into()))?;
        *torch = on;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Light page on a dark desk; `page` is `(x0, y0, x1, y1)` in pixels.
pub fn page_on_desk(width: u32, height: u32, page: (u32, u32, u32, u32)) -> DynamicImage {
    let (x0, y0, x1, y1) = page;
    let mut img = RgbImage::from_pixel(width, height, Rgb([38, 40, 44]));
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Rgb([236, 234, 228]));
        }
    }
    DynamicImage::ImageRgb8(img)
}

pub fn blank(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([38, 40, 44])))
}

/// Coordinator over a scripted camera with enhancement disabled, started and
/// with the session confirmed running.
pub async fn running_coordinator() -> (Arc<ScanCoordinator>, CameraScript) {
    let (camera, script) = scripted_camera();
    let session = Arc::new(CaptureSession::new(
        camera,
        CameraConfig {
            frame_timeout_ms: 10,
            frame_buffer: 1,
        },
    ));
    let config = ScanConfig {
        enhancement: EnhancementConfig::none(),
        ..ScanConfig::default()
    };
    let coordinator = Arc::new(ScanCoordinator::new(session, config));
    coordinator.start();
    timeout(WAIT, coordinator.session().wait_until_running())
        .await
        .expect("session start in time")
        .expect("session running");
    (coordinator, script)
}

/// Wait until the published detection satisfies `pred`.
pub async fn wait_for_detection(
    coordinator: &ScanCoordinator,
    pred: impl FnMut(&DetectionState) -> bool,
) -> DetectionState {
    let mut rx = coordinator.subscribe_detection();
    let state = timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("detection in time")
        .expect("coordinator alive");
    *state
}

/// Wait until the workflow state satisfies `pred`.
pub async fn wait_for_state(
    coordinator: &ScanCoordinator,
    pred: impl FnMut(&ScanState) -> bool,
) -> ScanState {
    let mut rx = coordinator.subscribe_state();
    let state = timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("state in time")
        .expect("coordinator alive");
    state.clone()
}
