// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClerkError, Result};

/// Top-level settings for the scan pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub detector: DetectorConfig,
    pub enhancement: EnhancementConfig,
    pub camera: CameraConfig,
}

/// Acceptance thresholds and smoothing for the quadrilateral detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum short-side / long-side ratio.
    pub min_aspect_ratio: f64,
    /// Maximum short-side / long-side ratio (1.0 admits squares).
    pub max_aspect_ratio: f64,
    /// Minimum quad area as a fraction of the frame area.
    pub min_size: f64,
    /// Allowed deviation of each interior angle from 90 degrees.
    pub quadrature_tolerance: f64,
    /// Exponential smoothing weight applied to each corner, in (0, 1].
    pub smoothing: f64,
    /// Frames are downscaled so their long side is at most this many pixels.
    pub working_dimension: u32,
    /// Gaussian blur sigma applied before thresholding.
    pub blur_sigma: f32,
    /// Accepted range of region pixel count / quad area.
    pub min_fill: f64,
    pub max_fill: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 1.0,
            min_size: 0.2,
            quadrature_tolerance: 30.0,
            smoothing: 0.5,
            working_dimension: 480,
            blur_sigma: 1.5,
            min_fill: 0.85,
            max_fill: 1.2,
        }
    }
}

/// Post-warp enhancement chain. `None` / `false` disables a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Contrast factor around mid-gray; 1.0 is a no-op.
    pub contrast: Option<f32>,
    pub sharpen: Option<SharpenConfig>,
    /// Gray-world white balance.
    pub white_balance: bool,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            contrast: Some(1.15),
            sharpen: Some(SharpenConfig::default()),
            white_balance: true,
        }
    }
}

impl EnhancementConfig {
    /// A chain with every pass disabled.
    pub fn none() -> Self {
        Self {
            contrast: None,
            sharpen: None,
            white_balance: false,
        }
    }
}

/// Unsharp-mask parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpenConfig {
    pub sigma: f32,
    pub threshold: i32,
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            threshold: 2,
        }
    }
}

/// Camera session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// How long the producer waits for a frame before re-checking whether the
    /// session was stopped.
    pub frame_timeout_ms: u64,
    /// Frames kept for slow subscribers before the oldest is dropped.
    pub frame_buffer: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 100,
            frame_buffer: 1,
        }
    }
}

impl ScanConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if !(d.smoothing > 0.0 && d.smoothing <= 1.0) {
            return Err(ClerkError::Config(format!(
                "detector.smoothing must be in (0, 1], got {}",
                d.smoothing
            )));
        }
        if !(d.min_aspect_ratio > 0.0 && d.min_aspect_ratio <= d.max_aspect_ratio)
            || d.max_aspect_ratio > 1.0
        {
            return Err(ClerkError::Config(format!(
                "aspect ratio bounds must satisfy 0 < min <= max <= 1, got {}..{}",
                d.min_aspect_ratio, d.max_aspect_ratio
            )));
        }
        if !(d.min_size > 0.0 && d.min_size <= 1.0) {
            return Err(ClerkError::Config(format!(
                "detector.min_size must be in (0, 1], got {}",
                d.min_size
            )));
        }
        if !(0.0..90.0).contains(&d.quadrature_tolerance) {
            return Err(ClerkError::Config(format!(
                "detector.quadrature_tolerance must be in [0, 90), got {}",
                d.quadrature_tolerance
            )));
        }
        if d.working_dimension < 32 {
            return Err(ClerkError::Config(format!(
                "detector.working_dimension must be at least 32, got {}",
                d.working_dimension
            )));
        }
        if d.min_fill > d.max_fill {
            return Err(ClerkError::Config("detector.min_fill exceeds max_fill".into()));
        }
        if self.camera.frame_buffer == 0 {
            return Err(ClerkError::Config("camera.frame_buffer must be at least 1".into()));
        }
        Ok(())
    }
}
