// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replay camera — serves a fixed set of images as a live preview feed.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clerk_core::error::{ClerkError, Result};
use clerk_core::types::encode_png;
use clerk_core::{Frame, Orientation, StillPhoto};
use image::DynamicImage;
use tracing::{debug, info, instrument};

use crate::traits::{CameraDevice, PhotoSettings};

#[derive(Debug, Default)]
struct ReplayState {
    open: bool,
    /// Index of the image the next frame will show.
    cursor: usize,
    /// Index of the image most recently shown, if any.
    showing: Option<usize>,
    last_emit: Option<Instant>,
}

/// Camera backed by in-memory images, cycled at a fixed interval.
///
/// Stills are PNG encodings of the image currently on screen, at full
/// resolution, so a detection made on the preview lines up exactly with the
/// still.
pub struct ReplayCamera {
    name: String,
    images: Vec<DynamicImage>,
    interval: Duration,
    orientation: Orientation,
    torch: Option<AtomicBool>,
    state: Mutex<ReplayState>,
}

impl ReplayCamera {
    /// Default time between frames (~30 fps).
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(33);

    pub fn new(images: Vec<DynamicImage>) -> Result<Self> {
        if images.is_empty() {
            return Err(ClerkError::CameraUnavailable("no images to replay".into()));
        }
        Ok(Self {
            name: format!("Replay ({} images)", images.len()),
            images,
            interval: Self::DEFAULT_INTERVAL,
            orientation: Orientation::Up,
            torch: None,
            state: Mutex::new(ReplayState::default()),
        })
    }

    /// Load every image from disk up front.
    #[instrument(skip_all, fields(count = paths.len()))]
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let img = image::open(path).map_err(|err| {
                ClerkError::ImageError(format!("failed to open {}: {}", path.display(), err))
            })?;
            debug!(path = %path.display(), width = img.width(), height = img.height(), "Replay image loaded");
            images.push(img);
        }
        Self::new(images)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Give the device a torch (reported through `has_torch`).
    pub fn with_torch(mut self) -> Self {
        self.torch = Some(AtomicBool::new(false));
        self
    }

    pub fn torch_lit(&self) -> bool {
        self.torch
            .as_ref()
            .map(|t| t.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().map(|s| s.open).unwrap_or(false)
    }

    fn poisoned() -> ClerkError {
        ClerkError::Capture("replay state lock poisoned".into())
    }
}

impl CameraDevice for ReplayCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
        state.open = true;
        state.last_emit = None;
        info!(device = %self.name, "Replay camera opened");
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.open = false;
        }
    }

    fn next_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        let wait = {
            let state = self.state.lock().map_err(|_| Self::poisoned())?;
            if !state.open {
                return Err(ClerkError::Capture("replay camera is not open".into()));
            }
            state
                .last_emit
                .map(|at| self.interval.saturating_sub(at.elapsed()))
                .unwrap_or(Duration::ZERO)
        };

        if wait > timeout {
            std::thread::sleep(timeout);
            return Ok(None);
        }
        std::thread::sleep(wait);

        let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
        let index = state.cursor;
        state.cursor = (index + 1) % self.images.len();
        state.showing = Some(index);
        state.last_emit = Some(Instant::now());
        Ok(Some(Frame::new(self.images[index].clone(), self.orientation)))
    }

    fn capture_still(&self, settings: &PhotoSettings) -> Result<StillPhoto> {
        let index = {
            let state = self.state.lock().map_err(|_| Self::poisoned())?;
            if !state.open {
                return Err(ClerkError::Capture("replay camera is not open".into()));
            }
            state.showing.unwrap_or(state.cursor)
        };
        let bytes = encode_png(&self.images[index])?;
        debug!(index, flash = settings.flash, bytes = bytes.len(), "Replay still encoded");
        Ok(StillPhoto::new(bytes, self.orientation))
    }

    fn has_torch(&self) -> bool {
        self.torch.is_some()
    }

    fn set_torch(&self, on: bool) -> Result<()> {
        match &self.torch {
            Some(torch) => {
                torch.store(on, Ordering::SeqCst);
                Ok(())
            }
            None => Err(ClerkError::Torch("replay camera has no torch".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([v, v, v])))
    }

    #[test]
    fn empty_replay_is_unavailable() {
        assert!(matches!(
            ReplayCamera::new(Vec::new()),
            Err(ClerkError::CameraUnavailable(_))
        ));
    }

    #[test]
    fn frames_cycle_through_images() {
        let cam = ReplayCamera::new(vec![solid(10), solid(20)])
            .expect("images")
            .with_interval(Duration::ZERO);
        cam.open().expect("open");

        let seen: Vec<u8> = (0..4)
            .map(|_| {
                let frame = cam
                    .next_frame(Duration::from_millis(10))
                    .expect("frame")
                    .expect("due");
                frame.image.to_rgb8().get_pixel(0, 0).0[0]
            })
            .collect();
        assert_eq!(seen, vec![10, 20, 10, 20]);
    }

    #[test]
    fn still_matches_the_frame_on_screen() {
        let cam = ReplayCamera::new(vec![solid(10), solid(200)])
            .expect("images")
            .with_interval(Duration::ZERO)
            .with_orientation(Orientation::Left);
        cam.open().expect("open");
        cam.next_frame(Duration::from_millis(10)).expect("frame");
        cam.next_frame(Duration::from_millis(10)).expect("frame");

        let still = cam.capture_still(&PhotoSettings::default()).expect("still");
        assert_eq!(still.orientation, Orientation::Left);
        let decoded = still.decode().expect("png");
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn frame_not_due_yet_times_out() {
        let cam = ReplayCamera::new(vec![solid(1)])
            .expect("images")
            .with_interval(Duration::from_secs(10));
        cam.open().expect("open");
        assert!(cam.next_frame(Duration::from_millis(5)).expect("ok").is_some());
        assert!(cam.next_frame(Duration::from_millis(5)).expect("ok").is_none());
    }

    #[test]
    fn closed_camera_refuses_work() {
        let cam = ReplayCamera::new(vec![solid(1)]).expect("images");
        assert!(cam.next_frame(Duration::from_millis(1)).is_err());
        assert!(cam.capture_still(&PhotoSettings::default()).is_err());
    }

    #[test]
    fn torch_only_when_fitted() {
        let bare = ReplayCamera::new(vec![solid(1)]).expect("images");
        assert!(!bare.has_torch());
        assert!(matches!(bare.set_torch(true), Err(ClerkError::Torch(_))));

        let lit = ReplayCamera::new(vec![solid(1)]).expect("images").with_torch();
        lit.set_torch(true).expect("torch");
        assert!(lit.torch_lit());
    }

    #[test]
    fn loads_images_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.png");
        solid(77).save(&path).expect("save");
        let cam = ReplayCamera::from_paths(&[&path]).expect("loaded");
        assert_eq!(cam.name(), "Replay (1 images)");
        assert!(ReplayCamera::from_paths(&[dir.path().join("missing.png")]).is_err());
    }
}
