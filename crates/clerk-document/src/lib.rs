// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clerk-document — Image-side processing for the Clerk scan engine.
//
// Provides coordinate geometry (normalization, aspect-fit display mapping,
// quad measurements), live document detection on camera frames, and the
// perspective correction and enhancement engine applied to captured stills.

pub mod correct;
pub mod detect;
pub mod geometry;
pub mod image;

// Re-export the primary structs so callers can use `clerk_document::QuadDetector` etc.
pub use correct::{EnhancementChain, EnhancementPass, PerspectiveCorrector};
pub use detect::QuadDetector;
pub use geometry::DisplayMapping;
pub use crate::image::processor::ImageProcessor;
