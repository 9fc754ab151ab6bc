// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry utilities — normalization, display ↔ source mapping for aspect-fit
// (letterboxed) views, and quadrilateral measurements.

use clerk_core::error::{ClerkError, Result};
use clerk_core::{Point, Quad};

/// Pixel → normalized (0..1).
pub fn normalize(point: Point, width: u32, height: u32) -> Point {
    point.normalize(width, height)
}

/// Normalized (0..1) → pixel.
pub fn denormalize(point: Point, width: u32, height: u32) -> Point {
    point.denormalize(width, height)
}

/// Swap between a top-left and a bottom-left origin. Applying it twice
/// returns the original point.
pub fn flip_vertical(point: Point, height: f64) -> Point {
    Point::new(point.x, height - point.y)
}

// -- Display mapping ----------------------------------------------------------

/// Maps between an image's native pixel space and an on-screen view that
/// shows the whole image scaled to fit (letterboxed or pillarboxed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMapping {
    image_width: f64,
    image_height: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl DisplayMapping {
    /// Fit an `image_width` x `image_height` image inside a view, preserving
    /// aspect ratio and centering it on the free axis.
    pub fn aspect_fit(
        image_width: u32,
        image_height: u32,
        view_width: f64,
        view_height: f64,
    ) -> Result<Self> {
        if image_width == 0 || image_height == 0 {
            return Err(ClerkError::ImageError(format!(
                "cannot map an empty image ({image_width}x{image_height})"
            )));
        }
        if !(view_width > 0.0 && view_height > 0.0) {
            return Err(ClerkError::ImageError(format!(
                "view must have a positive size, got {view_width}x{view_height}"
            )));
        }

        let (iw, ih) = (image_width as f64, image_height as f64);
        let scale = (view_width / iw).min(view_height / ih);
        Ok(Self {
            image_width: iw,
            image_height: ih,
            scale,
            offset_x: (view_width - iw * scale) / 2.0,
            offset_y: (view_height - ih * scale) / 2.0,
        })
    }

    /// Display units per source pixel.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Letterbox offsets `(x, y)` in display units.
    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    pub fn to_display(&self, source: Point) -> Point {
        Point::new(
            source.x * self.scale + self.offset_x,
            source.y * self.scale + self.offset_y,
        )
    }

    pub fn to_source(&self, display: Point) -> Point {
        Point::new(
            (display.x - self.offset_x) / self.scale,
            (display.y - self.offset_y) / self.scale,
        )
    }

    /// Clamp a source-space point to the image extent.
    pub fn clamp_to_image(&self, source: Point) -> Point {
        Point::new(
            source.x.clamp(0.0, self.image_width),
            source.y.clamp(0.0, self.image_height),
        )
    }
}

// -- Quad measurements --------------------------------------------------------

/// Natural output extent of rectifying `corners`: the longer of each pair of
/// opposite edges, rounded, at least 1 pixel.
pub fn rectified_size(corners: &[Point; 4]) -> (u32, u32) {
    let [tl, tr, br, bl] = corners;
    let width = tl.distance(tr).max(bl.distance(br));
    let height = tl.distance(bl).max(tr.distance(br));
    (
        (width.round() as u32).max(1),
        (height.round() as u32).max(1),
    )
}

/// Polygon area by the shoelace formula. Vertices in order (CW or CCW).
pub fn shoelace_area(corners: &[Point]) -> f64 {
    let n = corners.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += corners[i].x * corners[j].y;
        area -= corners[j].x * corners[i].y;
    }
    area.abs() / 2.0
}

/// Interior angle at each corner, in degrees.
pub fn interior_angles(corners: &[Point; 4]) -> [f64; 4] {
    let mut angles = [0.0; 4];
    for (i, angle) in angles.iter_mut().enumerate() {
        let prev = corners[(i + 3) % 4];
        let here = corners[i];
        let next = corners[(i + 1) % 4];
        let (ax, ay) = (prev.x - here.x, prev.y - here.y);
        let (bx, by) = (next.x - here.x, next.y - here.y);
        let denom = ax.hypot(ay) * bx.hypot(by);
        *angle = if denom == 0.0 {
            0.0
        } else {
            ((ax * bx + ay * by) / denom).clamp(-1.0, 1.0).acos().to_degrees()
        };
    }
    angles
}

/// True when every turn has the same, non-zero orientation.
pub fn is_convex(corners: &[Point; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Clamp every corner of a pixel-space quad into its image.
pub fn clamp_quad(quad: &Quad, width: u32, height: u32) -> Quad {
    let pixel = quad.to_pixel(width, height);
    Quad {
        corners: pixel.corners.map(|p| {
            Point::new(p.x.clamp(0.0, width as f64), p.y.clamp(0.0, height as f64))
        }),
        space: pixel.space,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::CoordSpace;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> [Point; 4] {
        [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    /// display → source → display is the identity for points in the image.
    #[test]
    fn display_mapping_round_trip_is_identity() {
        let cases = [
            (4032, 3024, 390.0, 844.0),
            (1000, 1400, 1920.0, 1080.0),
            (640, 480, 640.0, 480.0),
            (3, 7, 101.5, 33.25),
        ];
        for (iw, ih, vw, vh) in cases {
            let mapping = DisplayMapping::aspect_fit(iw, ih, vw, vh).expect("mapping");
            for &(fx, fy) in &[(0.0, 0.0), (0.25, 0.75), (1.0, 1.0), (0.5, 0.1)] {
                let source = Point::new(fx * iw as f64, fy * ih as f64);
                let display = mapping.to_display(source);
                let back = mapping.to_display(mapping.to_source(display));
                let tol = 1e-6 * display.x.abs().max(display.y.abs()).max(1.0);
                assert!(back.distance(&display) <= tol, "{iw}x{ih} in {vw}x{vh}");
            }
        }
    }

    #[test]
    fn aspect_fit_letterboxes_wide_image_in_tall_view() {
        let mapping = DisplayMapping::aspect_fit(200, 100, 100.0, 300.0).expect("mapping");
        assert!((mapping.scale() - 0.5).abs() < 1e-12);
        let (ox, oy) = mapping.offset();
        assert_eq!(ox, 0.0);
        assert!((oy - 125.0).abs() < 1e-12);
        assert_eq!(mapping.to_display(Point::new(0.0, 0.0)), Point::new(0.0, 125.0));
    }

    #[test]
    fn aspect_fit_rejects_empty_inputs() {
        assert!(DisplayMapping::aspect_fit(0, 10, 10.0, 10.0).is_err());
        assert!(DisplayMapping::aspect_fit(10, 10, 0.0, 10.0).is_err());
    }

    #[test]
    fn flip_vertical_is_an_involution() {
        let p = Point::new(12.5, 40.0);
        assert_eq!(flip_vertical(flip_vertical(p, 300.0), 300.0), p);
        assert_eq!(flip_vertical(p, 300.0), Point::new(12.5, 260.0));
    }

    #[test]
    fn rectified_size_of_concrete_scenario() {
        let corners = rect(100.0, 100.0, 900.0, 1300.0);
        assert_eq!(rectified_size(&corners), (800, 1200));
    }

    #[test]
    fn shoelace_area_rectangle() {
        let area = shoelace_area(&rect(0.0, 0.0, 10.0, 5.0));
        assert!((area - 50.0).abs() < 1e-9, "Expected 50.0, got {}", area);
    }

    #[test]
    fn angles_and_convexity() {
        let square = rect(0.0, 0.0, 4.0, 4.0);
        for angle in interior_angles(&square) {
            assert!((angle - 90.0).abs() < 1e-9);
        }
        assert!(is_convex(&square));

        // Bow-tie: TR and BR swapped.
        let twisted = [square[0], square[2], square[1], square[3]];
        assert!(!is_convex(&twisted));
    }

    #[test]
    fn clamp_quad_keeps_corners_inside() {
        let quad = Quad::new(
            [
                Point::new(-0.1, -0.2),
                Point::new(1.3, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.5),
            ],
            CoordSpace::Normalized,
        );
        let clamped = clamp_quad(&quad, 200, 100);
        assert_eq!(clamped.top_left(), Point::new(0.0, 0.0));
        assert_eq!(clamped.top_right(), Point::new(200.0, 0.0));
        assert_eq!(clamped.bottom_left(), Point::new(0.0, 100.0));
    }
}
