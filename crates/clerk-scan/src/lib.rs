// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clerk-scan — The interactive scan workflow.
//
// `ScanCoordinator` runs live detection over the capture session and turns a
// shutter press into a corrected image; `CornerEditor` covers the manual path
// where the user adjusts the corners before correction.

pub mod coordinator;
pub mod editor;

pub use coordinator::{FrozenCapture, ScanCoordinator};
pub use editor::{Corner, CornerEditor, HANDLE_RADIUS};
