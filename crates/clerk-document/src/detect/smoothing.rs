// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Temporal smoothing of detected corners.

use clerk_core::{CoordSpace, Point, Quad};

/// Per-corner exponential smoothing across frames.
///
/// Each published corner is `previous * (1 - alpha) + raw * alpha`. A frame
/// without a detection clears the history, so the next detection is
/// published as-is instead of sliding in from a stale position.
#[derive(Debug, Clone)]
pub struct CornerSmoother {
    alpha: f64,
    previous: Option<[Point; 4]>,
}

impl CornerSmoother {
    /// `alpha` is clamped into (0, 1]; 1.0 disables smoothing.
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            1.0
        };
        Self {
            alpha,
            previous: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Feed one raw detection and get the quad to publish.
    pub fn update(&mut self, raw: Option<Quad>) -> Option<Quad> {
        let Some(raw) = raw else {
            self.previous = None;
            return None;
        };
        let raw = raw.to_normalized().corners;

        let smoothed = match self.previous {
            Some(prev) => [0, 1, 2, 3].map(|i| prev[i].lerp(&raw[i], self.alpha)),
            None => raw,
        };
        self.previous = Some(smoothed);
        Some(Quad::new(smoothed, CoordSpace::Normalized))
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Frames needed before a step change of size `initial_error` is tracked
    /// to within `tolerance`: `ceil(ln(tolerance / initial_error) / ln(1 - alpha))`.
    pub fn frames_to_converge(&self, initial_error: f64, tolerance: f64) -> u32 {
        if initial_error <= tolerance {
            return 0;
        }
        if self.alpha >= 1.0 {
            return 1;
        }
        ((tolerance / initial_error).ln() / (1.0 - self.alpha).ln()).ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_at(offset: f64) -> Quad {
        Quad::new(
            [
                Point::new(0.1 + offset, 0.1),
                Point::new(0.9 + offset, 0.1),
                Point::new(0.9 + offset, 0.9),
                Point::new(0.1 + offset, 0.9),
            ],
            CoordSpace::Normalized,
        )
    }

    #[test]
    fn first_detection_is_published_raw() {
        let mut smoother = CornerSmoother::new(0.5);
        let raw = quad_at(0.05);
        assert_eq!(smoother.update(Some(raw)), Some(raw));
    }

    #[test]
    fn converges_within_the_analytic_bound() {
        let mut smoother = CornerSmoother::new(0.5);
        smoother.update(Some(quad_at(0.0)));

        let target = quad_at(0.1);
        let tolerance = 1e-3;
        let bound = smoother.frames_to_converge(0.1, tolerance);
        assert_eq!(bound, 7); // ceil(ln(0.01) / ln(0.5))

        let mut published = None;
        for _ in 0..bound {
            published = smoother.update(Some(target));
        }
        let published = published.expect("still detecting");
        assert!(published.max_corner_distance(&target) <= tolerance);
    }

    #[test]
    fn smoothing_moves_part_way() {
        let mut smoother = CornerSmoother::new(0.5);
        smoother.update(Some(quad_at(0.0)));
        let out = smoother.update(Some(quad_at(0.2))).expect("detected");
        assert!((out.top_left().x - 0.2).abs() < 1e-12);
    }

    #[test]
    fn missing_detection_resets_history() {
        let mut smoother = CornerSmoother::new(0.5);
        smoother.update(Some(quad_at(0.0)));
        assert_eq!(smoother.update(None), None);

        let raw = quad_at(0.08);
        assert_eq!(smoother.update(Some(raw)), Some(raw));
    }

    #[test]
    fn pixel_quads_are_normalized_before_blending() {
        let mut smoother = CornerSmoother::new(0.5);
        let pixel = quad_at(0.0).to_pixel(200, 100);
        let out = smoother.update(Some(pixel)).expect("detected");
        assert_eq!(out.space, CoordSpace::Normalized);
        assert!((out.top_right().x - 0.9).abs() < 1e-12);
    }

    #[test]
    fn invalid_alpha_disables_smoothing() {
        assert_eq!(CornerSmoother::new(0.0).alpha(), 1.0);
        assert_eq!(CornerSmoother::new(f64::NAN).alpha(), 1.0);
        assert_eq!(CornerSmoother::new(3.0).alpha(), 1.0);
    }
}
