// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clerk-camera — Camera device abstraction and the live capture session.
//
// Devices are blocking and platform specific; the session owns one device,
// drives it from a dedicated producer thread, and fans frames out to async
// subscribers. Hosts without a camera get the stub device; the replay device
// serves image files as a live feed for the CLI and tests.

pub mod replay;
pub mod session;
pub mod stub;
pub mod traits;

pub use replay::ReplayCamera;
pub use session::{CaptureSession, FrameStream, SessionStatus};
pub use stub::StubCamera;
pub use traits::{CameraDevice, PhotoSettings};
