// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live document detection — candidate search, acceptance filtering, and
// temporal smoothing.

pub mod acceptance;
pub mod detector;
pub mod search;
pub mod smoothing;

pub use acceptance::{AcceptanceParams, Rejection};
pub use detector::QuadDetector;
pub use search::find_quad;
pub use smoothing::CornerSmoother;
