// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Clerk scan pipeline.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClerkError, Result};

// ---------------------------------------------------------------------------
// Points and quadrilaterals
// ---------------------------------------------------------------------------

/// A 2D point. Origin is top-left, y grows downward, in whatever space the
/// owning value declares.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Pixel → normalized (0..1) for an image of `width` x `height`.
    pub fn normalize(&self, width: u32, height: u32) -> Point {
        Point::new(self.x / width as f64, self.y / height as f64)
    }

    /// Normalized (0..1) → pixel for an image of `width` x `height`.
    pub fn denormalize(&self, width: u32, height: u32) -> Point {
        Point::new(self.x * width as f64, self.y * height as f64)
    }

    /// Linear blend: `self * (1 - alpha) + target * alpha`.
    pub fn lerp(&self, target: &Point, alpha: f64) -> Point {
        Point::new(
            self.x * (1.0 - alpha) + target.x * alpha,
            self.y * (1.0 - alpha) + target.y * alpha,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// The coordinate space a [`Quad`] lives in. Always carried with the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordSpace {
    /// 0..1 on both axes, origin top-left.
    Normalized,
    /// Source pixels of an image with the given dimensions.
    Pixel { width: u32, height: u32 },
}

/// Four ordered corners of a document boundary: top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point; 4],
    pub space: CoordSpace,
}

impl Quad {
    pub fn new(corners: [Point; 4], space: CoordSpace) -> Self {
        Self { corners, space }
    }

    /// Build a quad from an arbitrary slice; anything but 4 points is rejected.
    pub fn from_points(points: &[Point], space: CoordSpace) -> Result<Self> {
        let corners: [Point; 4] = points
            .try_into()
            .map_err(|_| ClerkError::InvalidCorners(points.len()))?;
        Ok(Self { corners, space })
    }

    /// The full extent of an image, in its pixel space.
    pub fn full_image(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            corners: [
                Point::new(0.0, 0.0),
                Point::new(w, 0.0),
                Point::new(w, h),
                Point::new(0.0, h),
            ],
            space: CoordSpace::Pixel { width, height },
        }
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    /// Express this quad in normalized space.
    pub fn to_normalized(&self) -> Quad {
        match self.space {
            CoordSpace::Normalized => *self,
            CoordSpace::Pixel { width, height } => Quad {
                corners: self.corners.map(|p| p.normalize(width, height)),
                space: CoordSpace::Normalized,
            },
        }
    }

    /// Express this quad in the pixel space of a `width` x `height` image.
    pub fn to_pixel(&self, width: u32, height: u32) -> Quad {
        let normalized = self.to_normalized();
        Quad {
            corners: normalized.corners.map(|p| p.denormalize(width, height)),
            space: CoordSpace::Pixel { width, height },
        }
    }

    /// Largest per-corner distance to `other`. Both quads must share a space.
    pub fn max_corner_distance(&self, other: &Quad) -> f64 {
        self.corners
            .iter()
            .zip(other.corners.iter())
            .map(|(a, b)| a.distance(b))
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Frames, stills, and results
// ---------------------------------------------------------------------------

/// Display orientation recorded by the camera for a buffer.
///
/// Buffers are stored upright; the orientation is metadata that travels with
/// the image so the presenter can display it without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

/// One live frame from the camera. Exists only for the duration of one
/// detection call.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic sequence number assigned by the capture session.
    pub sequence: u64,
    pub image: DynamicImage,
    pub orientation: Orientation,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: DynamicImage, orientation: Orientation) -> Self {
        Self {
            sequence: 0,
            image,
            orientation,
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Unique identifier for one shutter press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureId(pub Uuid);

impl CaptureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaptureId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded high-resolution still as delivered by the camera.
#[derive(Debug, Clone)]
pub struct StillPhoto {
    /// Encoded image bytes (JPEG, PNG, ...).
    pub bytes: Vec<u8>,
    pub orientation: Orientation,
    /// Display scale factor (pixels per point).
    pub scale: f32,
    pub captured_at: DateTime<Utc>,
}

impl StillPhoto {
    pub fn new(bytes: Vec<u8>, orientation: Orientation) -> Self {
        Self {
            bytes,
            orientation,
            scale: 1.0,
            captured_at: Utc::now(),
        }
    }

    /// Read the pixel dimensions from the encoded header without decoding.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        image::ImageReader::new(std::io::Cursor::new(&self.bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|err| ClerkError::ImageError(format!("unreadable still header: {}", err)))
    }

    /// Decode the still into pixels.
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes).map_err(|err| {
            ClerkError::ImageError(format!("failed to decode still photo: {}", err))
        })
    }
}

/// The rectified, enhanced output of a scan. Immutable once produced.
#[derive(Debug, Clone)]
pub struct CorrectedImage {
    pub id: CaptureId,
    pub image: DynamicImage,
    pub orientation: Orientation,
    pub scale: f32,
    /// Corners used for rectification, in source pixel space. `None` when the
    /// still was passed through uncorrected.
    pub corners: Option<Quad>,
    pub rectified: bool,
    /// Names of the enhancement passes that actually ran, in order.
    pub passes_applied: Vec<&'static str>,
    pub produced_at: DateTime<Utc>,
}

impl CorrectedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}

/// Encode a `DynamicImage` as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|err| ClerkError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Encode a `DynamicImage` as JPEG with the given quality (1-100).
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| ClerkError::ImageError(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}

// ---------------------------------------------------------------------------
// Scan workflow state
// ---------------------------------------------------------------------------

/// Latest published detection, read by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionState {
    /// Normalized quad, or `None` when no document is visible.
    pub quad: Option<Quad>,
    /// Sequence number of the frame this detection came from.
    pub frame_sequence: u64,
}

/// Lifecycle of the interactive scan workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    /// No document in view.
    #[default]
    Idle,
    /// Overlay published.
    Detecting,
    /// Shutter pressed, awaiting the still.
    Capturing,
    /// Running the perspective engine.
    Correcting,
    /// Final image ready.
    Result,
    /// The last capture failed; the shutter is available again.
    Failed { reason: String },
}

impl ScanState {
    /// True while a capture owns the shutter.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Capturing | Self::Correcting)
    }

    /// True in the two live-preview states.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Idle | Self::Detecting)
    }
}
