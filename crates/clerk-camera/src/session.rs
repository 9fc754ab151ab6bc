// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture session — owns the camera, streams preview frames to subscribers,
// and serves one still capture at a time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clerk_core::config::CameraConfig;
use clerk_core::error::{ClerkError, Result};
use clerk_core::{Frame, StillPhoto};
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::traits::{CameraDevice, PhotoSettings};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Stopped,
    /// Producer launched, device not yet open.
    Starting,
    /// Frames are flowing.
    Running,
    /// The device could not be opened; carries the reason.
    Unavailable(String),
}

/// Lossy stream of preview frames.
///
/// Holds at most `frame_buffer` frames. A subscriber that falls behind loses
/// the oldest frames and resumes at the newest one.
pub struct FrameStream {
    rx: broadcast::Receiver<Arc<Frame>>,
}

impl FrameStream {
    /// Next frame, or `None` once the session is gone.
    pub async fn next(&mut self) -> Option<Arc<Frame>> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "Subscriber lagged; dropped stale frames");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Releases the still-capture slot when dropped, even if the capture panics.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared state the producer thread needs.
#[derive(Clone)]
struct Producer {
    device: Arc<dyn CameraDevice>,
    frames: broadcast::Sender<Arc<Frame>>,
    status: Arc<watch::Sender<SessionStatus>>,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    sequence: Arc<AtomicU64>,
    lifecycle: Arc<Mutex<()>>,
    frame_timeout: Duration,
}

/// Live camera session.
///
/// `start` and `stop` are idempotent and never block the caller: bring-up and
/// tear-down happen on the producer thread, serialised by one lifecycle lock
/// so successive runs never overlap on the device.
pub struct CaptureSession {
    producer: Producer,
    capturing: Arc<AtomicBool>,
    torch_on: Arc<AtomicBool>,
    // Held across a toggle so concurrent toggles flip in turn.
    torch_switch: AsyncMutex<()>,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn CameraDevice>, config: CameraConfig) -> Self {
        let (frames, _) = broadcast::channel(config.frame_buffer.max(1));
        let (status, _) = watch::channel(SessionStatus::Stopped);
        Self {
            producer: Producer {
                device,
                frames,
                status: Arc::new(status),
                running: Arc::new(AtomicBool::new(false)),
                generation: Arc::new(AtomicU64::new(0)),
                sequence: Arc::new(AtomicU64::new(0)),
                lifecycle: Arc::new(Mutex::new(())),
                frame_timeout: Duration::from_millis(config.frame_timeout_ms.max(1)),
            },
            capturing: Arc::new(AtomicBool::new(false)),
            torch_on: Arc::new(AtomicBool::new(false)),
            torch_switch: AsyncMutex::new(()),
        }
    }

    pub fn device_name(&self) -> &str {
        self.producer.device.name()
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Open the camera and begin streaming. No-op if already started.
    #[instrument(skip(self), fields(device = self.device_name()))]
    pub fn start(&self) {
        if self.producer.running.swap(true, Ordering::SeqCst) {
            debug!("Capture session already started");
            return;
        }
        let generation = self.producer.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.producer.status.send_replace(SessionStatus::Starting);

        let producer = self.producer.clone();
        let spawned = std::thread::Builder::new()
            .name("clerk-camera".into())
            .spawn(move || producer.run(generation));
        if let Err(err) = spawned {
            error!(error = %err, "Failed to spawn camera producer thread");
            self.producer.running.store(false, Ordering::SeqCst);
            self.producer
                .status
                .send_replace(SessionStatus::Unavailable(err.to_string()));
        }
    }

    /// Stop streaming. No-op if not running. Returns immediately; the device
    /// is closed by the producer thread.
    pub fn stop(&self) {
        if !self.producer.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!(device = self.device_name(), "Stopping capture session");
        self.producer.status.send_replace(SessionStatus::Stopped);
    }

    pub fn status(&self) -> SessionStatus {
        self.producer.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.producer.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.producer.status.borrow(), SessionStatus::Running)
    }

    /// Wait until the session is running. Fails if the device turned out to be
    /// unavailable or the session was stopped.
    pub async fn wait_until_running(&self) -> Result<()> {
        let mut rx = self.subscribe_status();
        let status = rx
            .wait_for(|s| !matches!(s, SessionStatus::Starting))
            .await
            .map_err(|err| ClerkError::Task(err.to_string()))?
            .clone();
        match status {
            SessionStatus::Running => Ok(()),
            SessionStatus::Unavailable(reason) => Err(ClerkError::CameraUnavailable(reason)),
            SessionStatus::Stopped | SessionStatus::Starting => Err(ClerkError::SessionNotRunning),
        }
    }

    // -- Frames ---------------------------------------------------------------

    /// Subscribe to preview frames published from now on.
    pub fn frames(&self) -> FrameStream {
        FrameStream {
            rx: self.producer.frames.subscribe(),
        }
    }

    // -- Stills ---------------------------------------------------------------

    /// Take a high-resolution still.
    ///
    /// Only one capture may be in flight; a second call fails with
    /// `CaptureBusy` rather than queueing. The hardware request runs on the
    /// blocking pool and owns the in-flight slot, so dropping this future does
    /// not cancel it or leave the slot held.
    #[instrument(skip(self), fields(device = self.device_name()))]
    pub async fn capture_photo(&self) -> Result<StillPhoto> {
        if !self.is_running() {
            return Err(ClerkError::SessionNotRunning);
        }
        if self.capturing.swap(true, Ordering::SeqCst) {
            debug!("Still capture already in flight");
            return Err(ClerkError::CaptureBusy);
        }
        let slot = InFlight(Arc::clone(&self.capturing));

        let settings = PhotoSettings {
            flash: self.torch_on.load(Ordering::SeqCst),
        };
        let device = Arc::clone(&self.producer.device);
        let result = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            device.capture_still(&settings)
        })
        .await
        .map_err(|err| ClerkError::Task(format!("still capture task failed: {err}")))?;

        match &result {
            Ok(photo) => info!(bytes = photo.bytes.len(), flash = settings.flash, "Still captured"),
            Err(err) => warn!(error = %err, "Still capture failed"),
        }
        result
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    // -- Torch ----------------------------------------------------------------

    pub fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::SeqCst)
    }

    /// Flip the torch and return the new state. A device without a torch, or
    /// one that refuses, leaves the state as it was.
    pub async fn toggle_torch(&self) -> bool {
        let _switch = self.torch_switch.lock().await;
        let current = self.torch_on();
        let device = Arc::clone(&self.producer.device);
        if !device.has_torch() {
            warn!(device = device.name(), "Torch requested on a device without one");
            return current;
        }

        let wanted = !current;
        let outcome = tokio::task::spawn_blocking(move || device.set_torch(wanted))
            .await
            .map_err(|err| ClerkError::Task(err.to_string()))
            .and_then(|r| r);
        match outcome {
            Ok(()) => {
                self.torch_on.store(wanted, Ordering::SeqCst);
                info!(on = wanted, "Torch switched");
                wanted
            }
            Err(err) => {
                warn!(error = %err, "Torch could not be switched");
                current
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.producer.running.store(false, Ordering::SeqCst);
    }
}

impl Producer {
    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Body of the producer thread for one start/stop run.
    fn run(self, generation: u64) {
        let _lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !self.is_current(generation) {
            debug!(generation, "Run superseded before the device was opened");
            return;
        }

        if let Err(err) = self.device.open() {
            error!(device = self.device.name(), error = %err, "Camera failed to open");
            if self.generation.load(Ordering::SeqCst) == generation {
                self.running.store(false, Ordering::SeqCst);
                self.status
                    .send_replace(SessionStatus::Unavailable(err.to_string()));
            }
            return;
        }

        if self.is_current(generation) {
            self.status.send_replace(SessionStatus::Running);
            info!(device = self.device.name(), "Capture session running");
        }

        while self.is_current(generation) {
            match self.device.next_frame(self.frame_timeout) {
                Ok(Some(mut frame)) => {
                    frame.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    // No subscribers is fine; the frame is simply dropped.
                    let _ = self.frames.send(Arc::new(frame));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Frame delivery failed");
                    std::thread::sleep(self.frame_timeout);
                }
            }
        }

        self.device.close();
        debug!(device = self.device.name(), generation, "Camera closed");
    }
}
