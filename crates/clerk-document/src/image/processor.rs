// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — downscaling, luma blur, contrast, sharpening, and
// white balance on in-memory images using the `image` and `imageproc` crates.

use clerk_core::error::{ClerkError, Result};
use clerk_core::types::{encode_jpeg, encode_png};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

/// Gains outside this range mean the scene has no usable neutral reference.
const WHITE_BALANCE_GAIN_RANGE: (f64, f64) = (0.5, 2.0);

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let png = ImageProcessor::from_bytes(&jpeg)?
///     .adjust_contrast(1.15)
///     .unsharpen(1.0, 2)
///     .to_png_bytes()?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| {
            ClerkError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.image.into_rgba8()
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Shrink so the long side is at most `max_dimension`. Never upscales.
    pub fn downscale_to(self, max_dimension: u32) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        if w.max(h) <= max_dimension {
            return self;
        }
        let resized =
            self.image
                .resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle);
        debug!(
            from_w = w,
            from_h = h,
            to_w = resized.width(),
            to_h = resized.height(),
            "Downscaled for analysis"
        );
        Self { image: resized }
    }

    /// Gaussian blur of the luma channel. Non-positive sigma is a no-op.
    pub fn blur_luma(self, sigma: f32) -> GrayImage {
        let gray = self.image.to_luma8();
        if sigma > 0.0 {
            gaussian_blur_f32(&gray, sigma)
        } else {
            gray
        }
    }

    /// Adjust contrast by a factor. Values > 1.0 increase contrast; values
    /// < 1.0 decrease it. A value of 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let rgba = self.image.to_rgba8();

        let contrasted = image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let adjust = |channel: u8| -> u8 {
                let val = factor * (channel as f32 - 128.0) + 128.0;
                val.clamp(0.0, 255.0) as u8
            };
            Rgba([adjust(r), adjust(g), adjust(b), a])
        });

        Self {
            image: DynamicImage::ImageRgba8(contrasted),
        }
    }

    /// Unsharp mask: add back the difference to a Gaussian blur wherever it
    /// exceeds `threshold`.
    #[instrument(skip(self), fields(sigma, threshold))]
    pub fn unsharpen(self, sigma: f32, threshold: i32) -> Self {
        let rgba = self.image.to_rgba8();
        let sharpened = image::imageops::unsharpen(&rgba, sigma, threshold);
        Self {
            image: DynamicImage::ImageRgba8(sharpened),
        }
    }

    /// Gray-world white balance: scale each colour channel so its mean matches
    /// the overall mean. Fully transparent pixels are ignored.
    ///
    /// Fails when a channel has (almost) no signal or the required gain is out
    /// of range, since the scene then offers no neutral reference.
    #[instrument(skip(self))]
    pub fn gray_world_balance(self) -> Result<Self> {
        let rgba = self.image.to_rgba8();

        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for Rgba([r, g, b, a]) in rgba.pixels() {
            if *a == 0 {
                continue;
            }
            sums[0] += *r as u64;
            sums[1] += *g as u64;
            sums[2] += *b as u64;
            count += 1;
        }
        if count == 0 {
            return Err(ClerkError::ImageError("no opaque pixels to balance".into()));
        }

        let means = sums.map(|s| s as f64 / count as f64);
        let gray = (means[0] + means[1] + means[2]) / 3.0;
        let mut gains = [1.0f64; 3];
        for (gain, mean) in gains.iter_mut().zip(means.iter()) {
            if *mean < 1.0 {
                return Err(ClerkError::ImageError(format!(
                    "channel mean {mean:.2} too low to balance"
                )));
            }
            *gain = gray / mean;
            if !(WHITE_BALANCE_GAIN_RANGE.0..=WHITE_BALANCE_GAIN_RANGE.1).contains(gain) {
                return Err(ClerkError::ImageError(format!(
                    "white balance gain {gain:.2} out of range"
                )));
            }
        }
        debug!(r = gains[0], g = gains[1], b = gains[2], "White balance gains");

        let balanced = image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let apply = |channel: u8, gain: f64| -> u8 {
                (channel as f64 * gain).round().clamp(0.0, 255.0) as u8
            };
            Rgba([apply(r, gains[0]), apply(g, gains[1]), apply(b, gains[2]), a])
        });

        Ok(Self {
            image: DynamicImage::ImageRgba8(balanced),
        })
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}
