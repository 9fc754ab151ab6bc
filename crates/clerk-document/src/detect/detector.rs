// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quad detector — runs the frame search off the async executor and smooths the
// result across frames.

use std::sync::Arc;

use clerk_core::config::DetectorConfig;
use clerk_core::{Frame, Quad};
use image::DynamicImage;
use tracing::{instrument, warn};

use crate::detect::search::find_quad;
use crate::detect::smoothing::CornerSmoother;

/// Stateful document detector for a stream of frames.
///
/// Frame search is CPU-bound, so [`QuadDetector::detect`] hands it to the
/// blocking pool. The detector keeps only the smoothing history between
/// calls; frames are dropped as soon as the search finishes.
pub struct QuadDetector {
    config: Arc<DetectorConfig>,
    smoother: CornerSmoother,
}

impl QuadDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let smoother = CornerSmoother::new(config.smoothing);
        Self {
            config: Arc::new(config),
            smoother,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the document in one live frame. Returns the smoothed quad in
    /// normalized coordinates, or `None` when nothing acceptable is visible.
    #[instrument(skip_all, fields(sequence = frame.sequence))]
    pub async fn detect(&mut self, frame: Arc<Frame>) -> Option<Quad> {
        let config = Arc::clone(&self.config);
        let raw = match tokio::task::spawn_blocking(move || find_quad(&frame.image, &config)).await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Detection task failed; treating frame as empty");
                None
            }
        };
        self.smoother.update(raw)
    }

    /// Synchronous variant for callers already off the executor.
    pub fn detect_image(&mut self, image: &DynamicImage) -> Option<Quad> {
        let raw = find_quad(image, &self.config);
        self.smoother.update(raw)
    }

    /// One-shot detection with no smoothing history, e.g. on a still.
    pub fn detect_still(&self, image: &DynamicImage) -> Option<Quad> {
        find_quad(image, &self.config)
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoother.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::Orientation;
    use image::{Rgb, RgbImage};

    fn page_frame(offset: u32) -> Arc<Frame> {
        let mut img = RgbImage::from_pixel(400, 300, Rgb([35, 35, 35]));
        for y in 50..250 {
            for x in (60 + offset)..(300 + offset) {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        Arc::new(Frame::new(DynamicImage::ImageRgb8(img), Orientation::Up))
    }

    fn blank_frame() -> Arc<Frame> {
        let img = RgbImage::from_pixel(400, 300, Rgb([35, 35, 35]));
        Arc::new(Frame::new(DynamicImage::ImageRgb8(img), Orientation::Up))
    }

    #[tokio::test]
    async fn detects_page_off_the_executor() {
        let mut detector = QuadDetector::new(DetectorConfig::default());
        let quad = detector.detect(page_frame(0)).await.expect("page found");
        assert!((quad.top_left().x - 0.15).abs() < 0.03);
    }

    #[tokio::test]
    async fn empty_frame_clears_smoothing() {
        let mut detector = QuadDetector::new(DetectorConfig::default());
        detector.detect(page_frame(0)).await.expect("page found");
        assert!(detector.detect(blank_frame()).await.is_none());

        // After a gap the next hit is raw, not blended with the old position.
        let after_gap = detector.detect(page_frame(40)).await.expect("page found");
        let raw = detector.detect_still(&page_frame(40).image).expect("page found");
        assert!(after_gap.max_corner_distance(&raw) < 1e-9);
    }

    #[tokio::test]
    async fn consecutive_hits_are_smoothed() {
        let mut detector = QuadDetector::new(DetectorConfig::default());
        let first = detector.detect(page_frame(0)).await.expect("page found");
        let second = detector.detect(page_frame(40)).await.expect("page found");
        let raw = detector.detect_still(&page_frame(40).image).expect("page found");

        // Halfway between the previous published quad and the raw detection.
        let expected = first.top_left().lerp(&raw.top_left(), 0.5);
        assert!(second.top_left().distance(&expected) < 1e-9);
    }
}
