// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Acceptance thresholds for candidate quadrilaterals.

use clerk_core::Point;
use clerk_core::config::DetectorConfig;

use crate::geometry::{interior_angles, is_convex, shoelace_area};

/// Why a candidate was turned down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Self-intersecting, concave, or collapsed to a line.
    NotConvex,
    /// Area fraction of the frame below the minimum.
    TooSmall { fraction: f64 },
    /// Short/long side ratio outside the allowed band.
    Aspect { ratio: f64 },
    /// Some interior angle too far from 90 degrees.
    Skewed { worst_deviation: f64 },
}

/// The tunable bounds a candidate must satisfy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceParams {
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub min_size: f64,
    pub quadrature_tolerance: f64,
}

impl From<&DetectorConfig> for AcceptanceParams {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
            min_size: config.min_size,
            quadrature_tolerance: config.quadrature_tolerance,
        }
    }
}

impl Default for AcceptanceParams {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

impl AcceptanceParams {
    /// Check `corners` (pixel space of a `frame_width` x `frame_height` frame).
    /// On success returns the quad's area in pixels, used for ranking.
    pub fn evaluate(
        &self,
        corners: &[Point; 4],
        frame_width: f64,
        frame_height: f64,
    ) -> Result<f64, Rejection> {
        if !is_convex(corners) {
            return Err(Rejection::NotConvex);
        }

        let area = shoelace_area(corners);
        let fraction = area / (frame_width * frame_height);
        if fraction < self.min_size {
            return Err(Rejection::TooSmall { fraction });
        }

        let ratio = aspect_ratio(corners);
        if ratio < self.min_aspect_ratio || ratio > self.max_aspect_ratio {
            return Err(Rejection::Aspect { ratio });
        }

        let worst_deviation = interior_angles(corners)
            .iter()
            .map(|a| (a - 90.0).abs())
            .fold(0.0, f64::max);
        if worst_deviation > self.quadrature_tolerance {
            return Err(Rejection::Skewed { worst_deviation });
        }

        Ok(area)
    }

    pub fn accepts(&self, corners: &[Point; 4], frame_width: f64, frame_height: f64) -> bool {
        self.evaluate(corners, frame_width, frame_height).is_ok()
    }
}

/// Short side over long side, using the mean length of opposite edges.
pub fn aspect_ratio(corners: &[Point; 4]) -> f64 {
    let [tl, tr, br, bl] = corners;
    let width = (tl.distance(tr) + bl.distance(br)) / 2.0;
    let height = (tl.distance(bl) + tr.distance(br)) / 2.0;
    let (short, long) = if width < height { (width, height) } else { (height, width) };
    if long == 0.0 { 0.0 } else { short / long }
}
