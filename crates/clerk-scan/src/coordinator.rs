// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan coordinator — drives live detection from the capture session and runs
// the shutter → still → correction workflow.
//
// The corners used for a capture are read from the published detection the
// instant the shutter is pressed, before the still is requested. Detection
// keeps running while the still is in flight, so anything published after
// the press belongs to later frames and never reaches this capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clerk_camera::{CaptureSession, SessionStatus};
use clerk_core::config::{DetectorConfig, ScanConfig};
use clerk_core::error::{ClerkError, Result};
use clerk_core::human_errors::humanize_error;
use clerk_core::{CorrectedImage, DetectionState, Quad, ScanState, StillPhoto};
use clerk_document::{PerspectiveCorrector, QuadDetector};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A still together with the corners that were on screen when it was taken.
#[derive(Debug, Clone)]
pub struct FrozenCapture {
    pub photo: StillPhoto,
    /// Normalized corners, or `None` if nothing was detected at the press.
    pub corners: Option<Quad>,
}

/// Holds the shutter for one capture. Dropping it frees the shutter and, if
/// the capture was abandoned part-way, returns the workflow to `Idle`.
struct Shutter<'a> {
    coordinator: &'a ScanCoordinator,
}

impl Drop for Shutter<'_> {
    fn drop(&mut self) {
        self.coordinator.state.send_if_modified(|state| {
            if state.is_busy() {
                *state = ScanState::Idle;
                true
            } else {
                false
            }
        });
        self.coordinator.busy.store(false, Ordering::SeqCst);
    }
}

/// Glues the capture session, detector, and perspective engine together.
///
/// Observers follow three `watch` channels: the latest detection (overlay),
/// the workflow state, and the latest result.
pub struct ScanCoordinator {
    session: Arc<CaptureSession>,
    detector_config: DetectorConfig,
    corrector: Arc<PerspectiveCorrector>,
    detection: Arc<watch::Sender<DetectionState>>,
    state: Arc<watch::Sender<ScanState>>,
    result: watch::Sender<Option<Arc<CorrectedImage>>>,
    busy: AtomicBool,
    detection_task: Mutex<Option<JoinHandle<()>>>,
}

impl ScanCoordinator {
    pub fn new(session: Arc<CaptureSession>, config: ScanConfig) -> Self {
        let (detection, _) = watch::channel(DetectionState::default());
        let (state, _) = watch::channel(ScanState::Idle);
        let (result, _) = watch::channel(None);
        Self {
            session,
            corrector: Arc::new(PerspectiveCorrector::new(&config.enhancement)),
            detector_config: config.detector,
            detection: Arc::new(detection),
            state: Arc::new(state),
            result,
            busy: AtomicBool::new(false),
            detection_task: Mutex::new(None),
        }
    }

    // -- Observables ----------------------------------------------------------

    pub fn subscribe_detection(&self) -> watch::Receiver<DetectionState> {
        self.detection.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    pub fn subscribe_result(&self) -> watch::Receiver<Option<Arc<CorrectedImage>>> {
        self.result.subscribe()
    }

    pub fn detection(&self) -> DetectionState {
        *self.detection.borrow()
    }

    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    pub fn latest_result(&self) -> Option<Arc<CorrectedImage>> {
        self.result.borrow().clone()
    }

    /// True while a capture holds the shutter.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn camera_available(&self) -> bool {
        !matches!(self.session.status(), SessionStatus::Unavailable(_))
    }

    pub fn torch_on(&self) -> bool {
        self.session.torch_on()
    }

    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Start the camera and the detection loop. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub fn start(&self) {
        let mut frames = self.session.frames();
        self.session.start();

        let Ok(mut task) = self.detection_task.lock() else {
            warn!("Detection task slot poisoned; detection not started");
            return;
        };
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Detection loop already running");
            return;
        }

        let mut detector = QuadDetector::new(self.detector_config.clone());
        let detection = Arc::clone(&self.detection);
        let state = Arc::clone(&self.state);
        // One frame at a time: frames arriving while a detection runs are
        // dropped by the lossy stream, so at most one detection is in flight.
        *task = Some(tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                let frame_sequence = frame.sequence;
                let quad = detector.detect(frame).await;
                detection.send_replace(DetectionState {
                    quad,
                    frame_sequence,
                });
                state.send_if_modified(|current| {
                    let next = match (current.is_live(), quad.is_some()) {
                        (true, true) => ScanState::Detecting,
                        (true, false) => ScanState::Idle,
                        (false, _) => return false,
                    };
                    if *current == next {
                        return false;
                    }
                    *current = next;
                    true
                });
            }
            debug!("Frame stream closed; detection loop ending");
        }));
        info!("Scan coordinator started");
    }

    /// Stop the detection loop and the camera. The published detection is
    /// cleared; a capture already in flight is left to finish.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        if let Ok(mut task) = self.detection_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
        self.session.stop();
        self.detection.send_replace(DetectionState::default());
        self.state.send_if_modified(|state| {
            if *state == ScanState::Detecting {
                *state = ScanState::Idle;
                true
            } else {
                false
            }
        });
        info!("Scan coordinator stopped");
    }

    // -- Shutter --------------------------------------------------------------

    fn claim_shutter(&self) -> Result<Shutter<'_>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Shutter pressed while a capture is in flight");
            return Err(ClerkError::CaptureBusy);
        }
        Ok(Shutter { coordinator: self })
    }

    /// Take a still and correct it with the corners on screen at the press.
    ///
    /// Without a detection the still is returned uncorrected. A second press
    /// while this one is running fails with `CaptureBusy`.
    #[instrument(skip(self))]
    pub async fn capture(&self) -> Result<Arc<CorrectedImage>> {
        let shutter = self.claim_shutter()?;
        let frozen = self.detection.borrow().quad;
        debug!(corners = frozen.is_some(), "Corners frozen for capture");
        self.state.send_replace(ScanState::Capturing);

        let photo = match self.session.capture_photo().await {
            Ok(photo) => photo,
            Err(err) => return Err(self.fail(err)),
        };

        self.state.send_replace(ScanState::Correcting);
        let corrector = Arc::clone(&self.corrector);
        let corrected = tokio::task::spawn_blocking(move || {
            correct_with_frozen(&corrector, &photo, frozen.as_ref())
        })
        .await
        .map_err(|err| ClerkError::Task(format!("correction task failed: {err}")))
        .and_then(|r| r);

        match corrected {
            Ok(image) => {
                let image = Arc::new(image);
                info!(
                    id = %image.id,
                    width = image.width(),
                    height = image.height(),
                    rectified = image.rectified,
                    "Scan complete"
                );
                self.result.send_replace(Some(Arc::clone(&image)));
                self.state.send_replace(ScanState::Result);
                drop(shutter);
                Ok(image)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Take a still for manual corner adjustment instead of correcting it
    /// immediately. The shutter is released and the workflow returns to
    /// `Idle` once the still is in hand.
    #[instrument(skip(self))]
    pub async fn capture_for_editing(&self) -> Result<FrozenCapture> {
        let shutter = self.claim_shutter()?;
        let corners = self.detection.borrow().quad;
        self.state.send_replace(ScanState::Capturing);

        match self.session.capture_photo().await {
            Ok(photo) => {
                drop(shutter);
                Ok(FrozenCapture { photo, corners })
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Publish an image corrected outside the shutter flow (manual editing).
    pub fn present_result(&self, image: CorrectedImage) -> Arc<CorrectedImage> {
        let image = Arc::new(image);
        self.result.send_replace(Some(Arc::clone(&image)));
        self.state.send_replace(ScanState::Result);
        image
    }

    /// Dismiss a result or failure and go back to live detection.
    pub fn cancel_viewing_result(&self) {
        let dismissed = self.state.send_if_modified(|state| match state {
            ScanState::Result | ScanState::Failed { .. } => {
                *state = ScanState::Idle;
                true
            }
            _ => false,
        });
        if dismissed {
            self.result.send_replace(None);
        }
    }

    /// Flip the torch; returns the new state. Does not touch the workflow.
    pub async fn toggle_torch(&self) -> bool {
        self.session.toggle_torch().await
    }

    fn fail(&self, err: ClerkError) -> ClerkError {
        let human = humanize_error(&err);
        warn!(error = %err, retriable = human.retriable, "Capture failed");
        self.state.send_replace(ScanState::Failed {
            reason: human.message,
        });
        err
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        if let Ok(mut task) = self.detection_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

/// Rectify `photo` with normalized `frozen` corners, or pass it through when
/// nothing was detected.
fn correct_with_frozen(
    corrector: &PerspectiveCorrector,
    photo: &StillPhoto,
    frozen: Option<&Quad>,
) -> Result<CorrectedImage> {
    let Some(quad) = frozen else {
        return corrector.uncorrected(photo);
    };
    let image = photo.decode()?;
    let pixel = quad.to_pixel(image.width(), image.height());
    corrector.correct(&image, &pixel.corners, photo.orientation, photo.scale)
}
