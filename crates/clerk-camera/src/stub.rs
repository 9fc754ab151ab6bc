// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub camera for desktop/CI builds where no capture hardware is available.
//
// Every operation returns `PlatformUnavailable`, so a session built on it
// settles in `SessionStatus::Unavailable` instead of failing at startup.

use std::time::Duration;

use clerk_core::error::{ClerkError, Result};
use clerk_core::{Frame, StillPhoto};

use crate::traits::{CameraDevice, PhotoSettings};

/// Camera that is never there.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubCamera;

impl CameraDevice for StubCamera {
    fn name(&self) -> &str {
        "No camera (stub)"
    }

    fn open(&self) -> Result<()> {
        tracing::warn!("CameraDevice::open called on stub camera");
        Err(ClerkError::PlatformUnavailable)
    }

    fn close(&self) {}

    fn next_frame(&self, _timeout: Duration) -> Result<Option<Frame>> {
        Err(ClerkError::PlatformUnavailable)
    }

    fn capture_still(&self, _settings: &PhotoSettings) -> Result<StillPhoto> {
        tracing::warn!("CameraDevice::capture_still called on stub camera");
        Err(ClerkError::PlatformUnavailable)
    }

    fn has_torch(&self) -> bool {
        false
    }

    fn set_torch(&self, _on: bool) -> Result<()> {
        Err(ClerkError::PlatformUnavailable)
    }
}
