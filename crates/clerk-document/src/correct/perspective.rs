// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction — warps a document quadrilateral onto an upright
// rectangle and runs the enhancement chain over the result.

use chrono::Utc;
use clerk_core::config::EnhancementConfig;
use clerk_core::error::{ClerkError, Result};
use clerk_core::{CaptureId, CorrectedImage, CoordSpace, Orientation, Point, Quad, StillPhoto};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

use crate::correct::enhance::EnhancementChain;
use crate::geometry::{rectified_size, shoelace_area};

/// Fill for output pixels that map outside the source image.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// How far a corner may sit outside the image, as a fraction of its long side.
const CORNER_MARGIN: f64 = 0.05;

/// Rectifies stills given four corners in the still's pixel space.
///
/// Corner order is top-left, top-right, bottom-right, bottom-left. Any other
/// order produces a mirrored or twisted output; the corrector does not try to
/// reorder.
///
/// `image` and `imageproc` both put the origin at the top-left with y growing
/// downward, which is also the convention of every `Point` in this crate, so
/// no vertical flip happens anywhere on this path.
#[derive(Debug, Default)]
pub struct PerspectiveCorrector {
    chain: EnhancementChain,
}

impl PerspectiveCorrector {
    pub fn new(config: &EnhancementConfig) -> Self {
        Self {
            chain: EnhancementChain::from_config(config),
        }
    }

    pub fn with_chain(chain: EnhancementChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &EnhancementChain {
        &self.chain
    }

    /// Warp only, no enhancement.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn rectify(&self, image: &DynamicImage, corners: &[Point]) -> Result<DynamicImage> {
        let corners = validate_corners(corners, image.width(), image.height())?;
        let (out_w, out_h) = rectified_size(&corners);

        let (w, h) = (out_w as f32, out_h as f32);
        let src = corners.map(|p| (p.x as f32, p.y as f32));
        let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
            ClerkError::DegenerateQuad("no projective transform maps these corners".into())
        })?;

        let rgba_input = image.to_rgba8();
        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(&rgba_input, &projection, Interpolation::Bilinear, BACKGROUND, &mut output);

        info!(out_w, out_h, "Perspective correction applied");
        Ok(DynamicImage::ImageRgba8(output))
    }

    /// Rectify and enhance a decoded image. `orientation` and `scale` are
    /// carried through to the output untouched.
    pub fn correct(
        &self,
        image: &DynamicImage,
        corners: &[Point],
        orientation: Orientation,
        scale: f32,
    ) -> Result<CorrectedImage> {
        let rectified = self.rectify(image, corners)?;
        let (enhanced, passes_applied) = self.chain.apply(rectified);
        let quad = Quad::from_points(
            corners,
            CoordSpace::Pixel {
                width: image.width(),
                height: image.height(),
            },
        )?;

        Ok(CorrectedImage {
            id: CaptureId::new(),
            image: enhanced,
            orientation,
            scale,
            corners: Some(quad),
            rectified: true,
            passes_applied,
            produced_at: Utc::now(),
        })
    }

    /// Decode `photo` and correct it. `corners` are in the decoded still's
    /// pixel space.
    #[instrument(skip_all, fields(bytes = photo.bytes.len()))]
    pub fn correct_photo(&self, photo: &StillPhoto, corners: &[Point]) -> Result<CorrectedImage> {
        let image = photo.decode()?;
        self.correct(&image, corners, photo.orientation, photo.scale)
    }

    /// Pass the still through without warping or enhancement.
    pub fn uncorrected(&self, photo: &StillPhoto) -> Result<CorrectedImage> {
        let image = photo.decode()?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Passing still through uncorrected"
        );
        Ok(CorrectedImage {
            id: CaptureId::new(),
            image,
            orientation: photo.orientation,
            scale: photo.scale,
            corners: None,
            rectified: false,
            passes_applied: Vec::new(),
            produced_at: Utc::now(),
        })
    }
}

/// Rectify and enhance with the default enhancement chain.
pub fn correct(image: &DynamicImage, corners: &[Point]) -> Result<CorrectedImage> {
    PerspectiveCorrector::new(&EnhancementConfig::default()).correct(
        image,
        corners,
        Orientation::Up,
        1.0,
    )
}

fn validate_corners(corners: &[Point], width: u32, height: u32) -> Result<[Point; 4]> {
    let corners: [Point; 4] = corners
        .try_into()
        .map_err(|_| ClerkError::InvalidCorners(corners.len()))?;
    if width == 0 || height == 0 {
        return Err(ClerkError::ImageError("image has no pixels".into()));
    }
    if let Some(bad) = corners.iter().find(|p| !p.is_finite()) {
        return Err(ClerkError::DegenerateQuad(format!("non-finite corner {bad:?}")));
    }

    // The output is sized from the corners, so they must stay near the image.
    let margin = CORNER_MARGIN * width.max(height) as f64;
    let (max_x, max_y) = (width as f64 + margin, height as f64 + margin);
    if let Some(bad) = corners
        .iter()
        .find(|p| p.x < -margin || p.y < -margin || p.x > max_x || p.y > max_y)
    {
        return Err(ClerkError::DegenerateQuad(format!(
            "corner {bad:?} lies outside the {width}x{height} image"
        )));
    }
    if shoelace_area(&corners) < 1.0 {
        return Err(ClerkError::DegenerateQuad("corners enclose no area".into()));
    }
    Ok(corners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correct::{Contrast, EnhancementPass};
    use clerk_core::types::encode_png;
    use image::{Rgb, RgbImage};

    fn plain() -> PerspectiveCorrector {
        PerspectiveCorrector::new(&EnhancementConfig::none())
    }

    /// White page with a black block in its top-left quarter, on a gray desk.
    fn marked_page(width: u32, height: u32, page: [Point; 4]) -> DynamicImage {
        let (x0, y0) = (page[0].x as u32, page[0].y as u32);
        let (x1, y1) = (page[2].x as u32, page[2].y as u32);
        let mut img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
        for y in y0..y1 {
            for x in x0..x1 {
                let in_mark = x < x0 + (x1 - x0) / 4 && y < y0 + (y1 - y0) / 4;
                let v = if in_mark { 0 } else { 255 };
                img.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> [Point; 4] {
        [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn output_size_follows_the_quad() {
        let corners = rect(100.0, 100.0, 900.0, 1300.0);
        let img = marked_page(1000, 1400, corners);
        let out = plain().rectify(&img, &corners).expect("rectified");
        assert_eq!((out.width(), out.height()), (800, 1200));
    }

    #[test]
    fn axis_aligned_crop_keeps_content_in_place() {
        let corners = rect(100.0, 100.0, 900.0, 1300.0);
        let img = marked_page(1000, 1400, corners);
        let out = plain().rectify(&img, &corners).expect("rectified").to_rgba8();

        // Black mark top-left, white elsewhere, no desk gray at the edges.
        assert_eq!(out.get_pixel(50, 50).0[0], 0);
        assert_eq!(out.get_pixel(600, 900).0[0], 255);
        assert_eq!(out.get_pixel(790, 10).0[0], 255);
    }

    #[test]
    fn wrong_corner_count_is_an_error() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(50, 50));
        let three = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let err = plain().rectify(&img, &three).unwrap_err();
        assert!(matches!(err, ClerkError::InvalidCorners(3)));
        let err = plain().rectify(&img, &[]).unwrap_err();
        assert!(matches!(err, ClerkError::InvalidCorners(0)));
    }

    #[test]
    fn collinear_corners_are_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(50, 50));
        let line = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(30.0, 30.0),
        ];
        assert!(matches!(
            plain().rectify(&img, &line),
            Err(ClerkError::DegenerateQuad(_))
        ));
    }

    #[test]
    fn corners_far_outside_the_image_are_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 100));
        let huge = rect(0.0, 0.0, 1e10, 1e10);
        assert!(matches!(correct(&img, &huge), Err(ClerkError::DegenerateQuad(_))));

        let negative = rect(-50.0, 10.0, 90.0, 90.0);
        assert!(matches!(
            plain().rectify(&img, &negative),
            Err(ClerkError::DegenerateQuad(_))
        ));
    }

    /// Detections that overshoot the frame edge by a pixel or two still work.
    #[test]
    fn corners_just_past_the_edge_are_accepted() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([200, 200, 200])));
        let out = plain()
            .rectify(&img, &rect(-2.0, -1.0, 102.0, 101.0))
            .expect("within margin");
        assert_eq!((out.width(), out.height()), (104, 102));
    }

    /// A pass that always errors.
    struct Broken;

    impl EnhancementPass for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn apply(&self, _image: &DynamicImage) -> Result<DynamicImage> {
            Err(ClerkError::Enhancement {
                pass: "broken",
                reason: "always fails".into(),
            })
        }
    }

    #[test]
    fn failing_pass_does_not_abort_correction() {
        let mut chain = EnhancementChain::empty();
        chain.push(Broken);
        chain.push(Contrast { factor: 1.0 });
        let corrector = PerspectiveCorrector::with_chain(chain);
        assert_eq!(corrector.chain().names(), vec!["broken", "contrast"]);

        let corners = rect(10.0, 10.0, 90.0, 110.0);
        let img = marked_page(100, 120, corners);
        let out = corrector
            .correct(&img, &corners, Orientation::Up, 1.0)
            .expect("corrected despite the broken pass");
        assert_eq!((out.width(), out.height()), (80, 100));
        assert_eq!(out.passes_applied, vec!["contrast"]);
    }

    /// Scaling the image and corners together scales the output and leaves
    /// the content where it was, relative to the output.
    #[test]
    fn rectification_commutes_with_uniform_scaling() {
        let corners = [
            Point::new(60.0, 40.0),
            Point::new(330.0, 70.0),
            Point::new(350.0, 380.0),
            Point::new(40.0, 360.0),
        ];
        let base = marked_page(400, 420, rect(40.0, 40.0, 350.0, 380.0));
        let doubled_img = base.resize_exact(800, 840, image::imageops::FilterType::Nearest);
        let doubled = corners.map(|p| Point::new(p.x * 2.0, p.y * 2.0));

        let a = plain().rectify(&base, &corners).expect("base");
        let b = plain().rectify(&doubled_img, &doubled).expect("doubled");

        assert!((b.width() as i64 - 2 * a.width() as i64).abs() <= 1);
        assert!((b.height() as i64 - 2 * a.height() as i64).abs() <= 1);

        let (a, b) = (a.to_luma8(), b.to_luma8());
        for (fx, fy) in [(0.08, 0.08), (0.5, 0.5), (0.75, 0.75), (0.8, 0.3), (0.3, 0.8)] {
            let pa = a.get_pixel((fx * a.width() as f64) as u32, (fy * a.height() as f64) as u32);
            let pb = b.get_pixel((fx * b.width() as f64) as u32, (fy * b.height() as f64) as u32);
            assert!(
                (pa.0[0] as i32 - pb.0[0] as i32).abs() <= 40,
                "sample ({fx}, {fy}): {} vs {}",
                pa.0[0],
                pb.0[0]
            );
        }
    }

    #[test]
    fn keystoned_page_becomes_rectangular() {
        // Top edge narrower than the bottom, as when shooting from below.
        let corners = [
            Point::new(150.0, 100.0),
            Point::new(450.0, 100.0),
            Point::new(550.0, 500.0),
            Point::new(50.0, 500.0),
        ];
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(600, 600, Rgb([255, 255, 255])));
        let out = plain().rectify(&img, &corners).expect("rectified");
        assert_eq!(out.width(), 500);
        assert_eq!(out.height(), 412);
    }

    #[test]
    fn metadata_is_carried_through() {
        let corners = rect(10.0, 10.0, 90.0, 110.0);
        let img = marked_page(100, 120, corners);
        let mut photo = StillPhoto::new(encode_png(&img).expect("png"), Orientation::Right);
        photo.scale = 3.0;

        let corrector = PerspectiveCorrector::new(&EnhancementConfig::default());
        let out = corrector.correct_photo(&photo, &corners).expect("corrected");
        assert_eq!(out.orientation, Orientation::Right);
        assert_eq!(out.scale, 3.0);
        assert!(out.rectified);
        assert_eq!(out.passes_applied, vec!["contrast", "sharpen", "white_balance"]);
        let quad = out.corners.expect("corners recorded");
        assert_eq!(quad.corners, corners);
        assert_eq!(quad.space, CoordSpace::Pixel { width: 100, height: 120 });
    }

    #[test]
    fn uncorrected_keeps_full_frame() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([1, 2, 3])));
        let photo = StillPhoto::new(encode_png(&img).expect("png"), Orientation::Down);
        let out = plain().uncorrected(&photo).expect("decoded");
        assert_eq!((out.width(), out.height()), (64, 48));
        assert!(!out.rectified);
        assert!(out.corners.is_none());
        assert_eq!(out.orientation, Orientation::Down);
    }

    #[test]
    fn undecodable_still_is_an_error() {
        let photo = StillPhoto::new(b"garbage".to_vec(), Orientation::Up);
        let corners = rect(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            plain().correct_photo(&photo, &corners),
            Err(ClerkError::ImageError(_))
        ));
    }
}
