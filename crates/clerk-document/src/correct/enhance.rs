// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Post-warp enhancement passes — contrast, sharpening, and white balance.

use clerk_core::config::EnhancementConfig;
use clerk_core::error::{ClerkError, Result};
use image::DynamicImage;
use tracing::{debug, warn};

use crate::image::ImageProcessor;

/// One optional step in the enhancement chain.
pub trait EnhancementPass: Send + Sync {
    /// Stable name, recorded in `CorrectedImage::passes_applied`.
    fn name(&self) -> &'static str;

    /// Produce an enhanced copy of `image`.
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage>;
}

/// Linear contrast stretch around mid-gray.
#[derive(Debug, Clone, Copy)]
pub struct Contrast {
    pub factor: f32,
}

impl EnhancementPass for Contrast {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(ClerkError::Enhancement {
                pass: self.name(),
                reason: format!("invalid contrast factor {}", self.factor),
            });
        }
        Ok(ImageProcessor::from_dynamic(image.clone())
            .adjust_contrast(self.factor)
            .into_dynamic())
    }
}

/// Unsharp mask.
#[derive(Debug, Clone, Copy)]
pub struct Sharpen {
    pub sigma: f32,
    pub threshold: i32,
}

impl EnhancementPass for Sharpen {
    fn name(&self) -> &'static str {
        "sharpen"
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(ClerkError::Enhancement {
                pass: self.name(),
                reason: format!("invalid sharpen sigma {}", self.sigma),
            });
        }
        Ok(ImageProcessor::from_dynamic(image.clone())
            .unsharpen(self.sigma, self.threshold)
            .into_dynamic())
    }
}

/// Gray-world neutral balance.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhiteBalance;

impl EnhancementPass for WhiteBalance {
    fn name(&self) -> &'static str {
        "white_balance"
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        ImageProcessor::from_dynamic(image.clone())
            .gray_world_balance()
            .map(ImageProcessor::into_dynamic)
            .map_err(|err| ClerkError::Enhancement {
                pass: self.name(),
                reason: err.to_string(),
            })
    }
}

/// Ordered list of passes. A pass that fails is skipped and its input flows
/// on to the next one unchanged.
#[derive(Default)]
pub struct EnhancementChain {
    passes: Vec<Box<dyn EnhancementPass>>,
}

impl EnhancementChain {
    /// An empty chain; output equals input.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Contrast, then sharpen, then white balance, each if enabled.
    pub fn from_config(config: &EnhancementConfig) -> Self {
        let mut chain = Self::empty();
        if let Some(factor) = config.contrast {
            chain.push(Contrast { factor });
        }
        if let Some(sharpen) = config.sharpen {
            chain.push(Sharpen {
                sigma: sharpen.sigma,
                threshold: sharpen.threshold,
            });
        }
        if config.white_balance {
            chain.push(WhiteBalance);
        }
        chain
    }

    pub fn push(&mut self, pass: impl EnhancementPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass in order. Returns the final image and the names of the
    /// passes that succeeded.
    pub fn apply(&self, image: DynamicImage) -> (DynamicImage, Vec<&'static str>) {
        let mut current = image;
        let mut applied = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            match pass.apply(&current) {
                Ok(next) => {
                    current = next;
                    applied.push(pass.name());
                }
                Err(err) => {
                    warn!(pass = pass.name(), error = %err, "Enhancement pass failed; skipping");
                }
            }
        }
        debug!(?applied, "Enhancement chain complete");
        (current, applied)
    }
}

impl std::fmt::Debug for EnhancementChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementChain")
            .field("passes", &self.names())
            .finish()
    }
}
