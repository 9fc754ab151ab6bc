// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective & enhancement engine.

pub mod enhance;
pub mod perspective;

pub use enhance::{Contrast, EnhancementChain, EnhancementPass, Sharpen, WhiteBalance};
pub use perspective::{PerspectiveCorrector, correct};
