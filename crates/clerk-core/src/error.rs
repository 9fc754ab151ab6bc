// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Clerk.

use thiserror::Error;

/// Top-level error type for all Clerk operations.
///
/// "No document in this frame" is not an error and never appears here; the
/// detector reports it as `None`.
#[derive(Debug, Error)]
pub enum ClerkError {
    // -- Camera errors --
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("camera session is not running")]
    SessionNotRunning,

    #[error("photo capture failed: {0}")]
    Capture(String),

    #[error("a capture is already in progress")]
    CaptureBusy,

    #[error("torch control failed: {0}")]
    Torch(String),

    // -- Image / geometry errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("expected exactly 4 corners, got {0}")]
    InvalidCorners(usize),

    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(String),

    #[error("enhancement pass `{pass}` failed: {reason}")]
    Enhancement { pass: &'static str, reason: String },

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Runtime --
    #[error("background task failed: {0}")]
    Task(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClerkError>;
