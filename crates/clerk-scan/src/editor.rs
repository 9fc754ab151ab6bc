// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Manual corner editor — lets the user drag the four document corners over a
// letterboxed preview of the still before correcting it.

use clerk_core::error::Result;
use clerk_core::{CorrectedImage, CoordSpace, Point, Quad, StillPhoto};
use clerk_document::PerspectiveCorrector;
use clerk_document::geometry::{DisplayMapping, clamp_quad};
use tracing::{debug, instrument};

use crate::coordinator::FrozenCapture;

/// Grab radius around a handle, in display units (half a 24-unit handle).
pub const HANDLE_RADIUS: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// Binding corner order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }
}

/// Editable quadrilateral over one still.
///
/// Corners are stored in source pixels and are always inside the image; the
/// display mapping is only used to translate pointer positions.
#[derive(Debug, Clone)]
pub struct CornerEditor {
    image_width: u32,
    image_height: u32,
    mapping: DisplayMapping,
    initial: [Point; 4],
    corners: [Point; 4],
}

impl CornerEditor {
    /// `initial` may be in any space; without one the editor starts at the
    /// image's own corners.
    pub fn new(
        image_width: u32,
        image_height: u32,
        view_width: f64,
        view_height: f64,
        initial: Option<&Quad>,
    ) -> Result<Self> {
        let mapping = DisplayMapping::aspect_fit(image_width, image_height, view_width, view_height)?;
        let start = match initial {
            Some(quad) => clamp_quad(quad, image_width, image_height),
            None => Quad::full_image(image_width, image_height),
        };
        Ok(Self {
            image_width,
            image_height,
            mapping,
            initial: start.corners,
            corners: start.corners,
        })
    }

    /// Editor for a still taken with `capture_for_editing`, seeded with the
    /// corners frozen at the press.
    pub fn from_capture(capture: &FrozenCapture, view_width: f64, view_height: f64) -> Result<Self> {
        let (width, height) = capture.photo.dimensions()?;
        Self::new(width, height, view_width, view_height, capture.corners.as_ref())
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn mapping(&self) -> &DisplayMapping {
        &self.mapping
    }

    /// Source-pixel position of one corner.
    pub fn corner(&self, corner: Corner) -> Point {
        self.corners[corner.index()]
    }

    /// Handle positions in display space, in corner order.
    pub fn display_corners(&self) -> [Point; 4] {
        self.corners.map(|p| self.mapping.to_display(p))
    }

    /// Current corners in the still's pixel space.
    pub fn source_corners(&self) -> Quad {
        Quad::new(
            self.corners,
            CoordSpace::Pixel {
                width: self.image_width,
                height: self.image_height,
            },
        )
    }

    /// The handle nearest to `display`, if within `radius`.
    pub fn hit_test(&self, display: Point, radius: f64) -> Option<Corner> {
        let handles = self.display_corners();
        Corner::ALL
            .into_iter()
            .map(|c| (c, handles[c.index()].distance(&display)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }

    /// Move one corner to a display position, clamped to the image. Returns
    /// the corner's new source position.
    pub fn drag(&mut self, corner: Corner, display: Point) -> Point {
        if !display.is_finite() {
            return self.corner(corner);
        }
        let source = self.mapping.clamp_to_image(self.mapping.to_source(display));
        self.corners[corner.index()] = source;
        source
    }

    /// Re-fit after the view was resized. Corners stay where they are on the
    /// image.
    pub fn set_view_size(&mut self, view_width: f64, view_height: f64) -> Result<()> {
        self.mapping =
            DisplayMapping::aspect_fit(self.image_width, self.image_height, view_width, view_height)?;
        Ok(())
    }

    /// Back to the corners the editor was opened with.
    pub fn reset(&mut self) {
        self.corners = self.initial;
    }

    /// Correct `photo` with the edited corners.
    #[instrument(skip_all)]
    pub fn confirm(&self, corrector: &PerspectiveCorrector, photo: &StillPhoto) -> Result<CorrectedImage> {
        let image = photo.decode()?;
        // A still at a different resolution than the one edited gets the
        // corners rescaled, not clipped.
        let corners = self.source_corners().to_pixel(image.width(), image.height());
        debug!(corners = ?corners.corners, "Confirming edited corners");
        corrector.correct(&image, &corners.corners, photo.orientation, photo.scale)
    }
}
