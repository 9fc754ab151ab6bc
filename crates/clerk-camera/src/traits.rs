// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic camera device trait.
//
// Every method may block on hardware. The capture session only calls them from
// its producer thread or the blocking pool, never from the async executor.

use std::time::Duration;

use clerk_core::error::Result;
use clerk_core::{Frame, StillPhoto};

/// Options for one high-resolution still.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhotoSettings {
    /// Fire the flash. Set when the torch is on, so the still matches the
    /// lighting the user saw in the preview.
    pub flash: bool,
}

/// A camera that streams preview frames and takes stills.
///
/// Implementations use interior mutability; the session shares the device
/// between its producer thread and still captures.
pub trait CameraDevice: Send + Sync {
    /// Human-readable device name (e.g. "Back Camera", "Replay (3 images)").
    fn name(&self) -> &str;

    /// Acquire the hardware and start streaming. Fails if the camera is
    /// missing or access is denied.
    fn open(&self) -> Result<()>;

    /// Stop streaming and release the hardware. Safe to call when not open.
    fn close(&self);

    /// Wait up to `timeout` for the next preview frame.
    /// Returns Ok(None) if none arrived in time.
    fn next_frame(&self, timeout: Duration) -> Result<Option<Frame>>;

    /// Take one full-resolution still.
    fn capture_still(&self, settings: &PhotoSettings) -> Result<StillPhoto>;

    /// Whether the device has a controllable torch.
    fn has_torch(&self) -> bool;

    /// Switch the torch on or off.
    fn set_torch(&self, on: bool) -> Result<()>;
}
