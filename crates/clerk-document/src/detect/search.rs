// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-frame quadrilateral search.
//
// The frame is downscaled, blurred, and split into a bright and a dark mask by
// an Otsu threshold. Every 8-connected region of either mask that does not
// touch the frame border is a candidate; its four extreme pixels along the
// diagonals give the corners. Holes a region encloses (print on a page, a
// window in a frame) count as part of it. Regions that still do not fill
// their quad are dropped, the rest go through the acceptance filter, and the
// largest survivor wins.

use std::collections::HashMap;

use clerk_core::config::DetectorConfig;
use clerk_core::{CoordSpace, Point, Quad};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, trace};

use crate::detect::acceptance::AcceptanceParams;
use crate::geometry::shoelace_area;
use crate::image::ImageProcessor;

/// A region that passed the fill check, in working-image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: [Point; 4],
    /// Quad area in working pixels.
    pub area: f64,
    /// Region pixel count, enclosed holes included, over quad area.
    pub fill: f64,
}

/// A 4-connected background component of a mask.
#[derive(Debug, Clone, Copy)]
struct HoleStats {
    pixels: u64,
    touches_border: bool,
    // Leftmost pixel; its left neighbour belongs to the enclosing region.
    leftmost: (u32, u32),
}

/// Running statistics for one labelled region.
#[derive(Debug, Clone, Copy)]
struct RegionStats {
    pixels: u64,
    touches_border: bool,
    // (score, x, y) of the extreme pixel along each diagonal.
    min_sum: (i64, u32, u32),
    max_sum: (i64, u32, u32),
    min_diff: (i64, u32, u32),
    max_diff: (i64, u32, u32),
}

impl RegionStats {
    fn new(x: u32, y: u32) -> Self {
        let sum = x as i64 + y as i64;
        let diff = x as i64 - y as i64;
        Self {
            pixels: 0,
            touches_border: false,
            min_sum: (sum, x, y),
            max_sum: (sum, x, y),
            min_diff: (diff, x, y),
            max_diff: (diff, x, y),
        }
    }

    fn add(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.pixels += 1;
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            self.touches_border = true;
        }
        let sum = x as i64 + y as i64;
        let diff = x as i64 - y as i64;
        if sum < self.min_sum.0 {
            self.min_sum = (sum, x, y);
        }
        if sum > self.max_sum.0 {
            self.max_sum = (sum, x, y);
        }
        if diff < self.min_diff.0 {
            self.min_diff = (diff, x, y);
        }
        if diff > self.max_diff.0 {
            self.max_diff = (diff, x, y);
        }
    }

    /// Corners at the outer edge of the extreme pixels, so a filled
    /// axis-aligned w x h block yields a w x h quad.
    fn corners(&self) -> [Point; 4] {
        let at = |(_, x, y): (i64, u32, u32), dx: f64, dy: f64| {
            Point::new(x as f64 + dx, y as f64 + dy)
        };
        [
            at(self.min_sum, 0.0, 0.0),
            at(self.max_diff, 1.0, 0.0),
            at(self.max_sum, 1.0, 1.0),
            at(self.min_diff, 0.0, 1.0),
        ]
    }
}

/// Find the best document quadrilateral in `image`, normalized to 0..1.
pub fn find_quad(image: &DynamicImage, config: &DetectorConfig) -> Option<Quad> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return None;
    }

    let blurred = ImageProcessor::from_dynamic(image.clone())
        .downscale_to(config.working_dimension)
        .blur_luma(config.blur_sigma);
    let (work_w, work_h) = blurred.dimensions();

    let params = AcceptanceParams::from(config);
    let threshold = otsu_threshold(&blurred);
    let (bright, dark) = polarity_masks(&blurred, threshold);

    let mut best: Option<(f64, [Point; 4])> = None;
    for mask in [&bright, &dark] {
        for candidate in candidates(mask, config) {
            match params.evaluate(&candidate.corners, work_w as f64, work_h as f64) {
                Ok(area) => {
                    if best.is_none_or(|(best_area, _)| area > best_area) {
                        best = Some((area, candidate.corners));
                    }
                }
                Err(reason) => trace!(?reason, area = candidate.area, "Candidate rejected"),
            }
        }
    }

    let (area, corners) = best?;
    debug!(
        threshold,
        area_fraction = area / (work_w as f64 * work_h as f64),
        "Document quadrilateral found"
    );
    let normalized = corners.map(|p| p.normalize(work_w, work_h));
    Some(Quad::new(normalized, CoordSpace::Normalized))
}

/// Split `gray` at `threshold`: pixels above go to the bright mask, the rest
/// to the dark mask. Foreground is 255 in both.
pub fn polarity_masks(gray: &GrayImage, threshold: u8) -> (GrayImage, GrayImage) {
    let (width, height) = gray.dimensions();
    let mut bright = GrayImage::new(width, height);
    let mut dark = GrayImage::new(width, height);
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] > threshold {
            bright.put_pixel(x, y, Luma([255]));
        } else {
            dark.put_pixel(x, y, Luma([255]));
        }
    }
    (bright, dark)
}

/// Label the foreground of `mask` and turn each interior region that fills its
/// corner quad into a candidate.
pub fn candidates(mask: &GrayImage, config: &DetectorConfig) -> Vec<Candidate> {
    let (width, height) = mask.dimensions();
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut regions: HashMap<u32, RegionStats> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label.0[0];
        if id == 0 {
            continue;
        }
        regions
            .entry(id)
            .or_insert_with(|| RegionStats::new(x, y))
            .add(x, y, width, height);
    }

    let filled = enclosed_hole_pixels(mask, &labels);

    // A region can only reach the size threshold if it has at least this many
    // pixels at the lowest accepted fill.
    let min_pixels = (config.min_size * config.min_fill * width as f64 * height as f64) as u64;

    let mut found = Vec::new();
    for (id, stats) in &regions {
        let pixels = stats.pixels + filled.get(id).copied().unwrap_or(0);
        if stats.touches_border || pixels < min_pixels {
            continue;
        }
        let corners = stats.corners();
        let area = shoelace_area(&corners);
        if area <= 0.0 {
            continue;
        }
        let fill = pixels as f64 / area;
        if fill < config.min_fill || fill > config.max_fill {
            trace!(fill, pixels, "Region does not fill its quad");
            continue;
        }
        found.push(Candidate { corners, area, fill });
    }
    found
}

/// Pixel count of the holes each foreground region encloses, keyed by the
/// region's label in `labels`.
///
/// Holes are 4-connected background components that do not reach the frame
/// border, the dual of the 8-connected foreground. Islands nested inside a
/// hole are not credited to the outer region.
fn enclosed_hole_pixels(
    mask: &GrayImage,
    labels: &ImageBuffer<Luma<u32>, Vec<u32>>,
) -> HashMap<u32, u64> {
    let (width, height) = mask.dimensions();
    let background = connected_components(mask, Connectivity::Four, Luma([255u8]));

    let mut holes: HashMap<u32, HoleStats> = HashMap::new();
    for (x, y, label) in background.enumerate_pixels() {
        let id = label.0[0];
        if id == 0 {
            continue;
        }
        let hole = holes.entry(id).or_insert(HoleStats {
            pixels: 0,
            touches_border: false,
            leftmost: (x, y),
        });
        hole.pixels += 1;
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            hole.touches_border = true;
        }
        if x < hole.leftmost.0 {
            hole.leftmost = (x, y);
        }
    }

    let mut filled: HashMap<u32, u64> = HashMap::new();
    for hole in holes.values().filter(|h| !h.touches_border) {
        let (x, y) = hole.leftmost;
        let owner = labels.get_pixel(x - 1, y).0[0];
        if owner != 0 {
            *filled.entry(owner).or_default() += hole.pixels;
        }
    }
    filled
}

/// Compute the optimal global threshold using Otsu's method.
///
/// Maximises the between-class variance of the histogram. Pixels at or below
/// the returned value form the background class.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0u64;
    let mut max_variance = 0.0;
    let mut best_threshold = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;
        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}
