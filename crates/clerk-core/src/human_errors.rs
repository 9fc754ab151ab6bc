// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the scan screen.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives how the UI presents it (toast, banner, or blocking).

use crate::error::ClerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Try the shutter again.
    Transient,
    /// User must do something (grant permission, wait for the capture).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether pressing the shutter again is likely to work.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ClerkError` into a `HumanError` for the scan screen.
pub fn humanize_error(err: &ClerkError) -> HumanError {
    match err {
        ClerkError::CameraUnavailable(_) | ClerkError::PlatformUnavailable => HumanError {
            message: "No camera is available.".into(),
            suggestion: "Check that this app is allowed to use the camera, or import a photo instead."
                .into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ClerkError::SessionNotRunning => HumanError {
            message: "The camera is not running.".into(),
            suggestion: "Wait for the preview to appear, then take the photo again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ClerkError::Capture(detail) => {
            if detail.contains("permission") {
                HumanError {
                    message: "Camera access was turned off.".into(),
                    suggestion: "Allow camera access in settings, then try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "The photo could not be taken.".into(),
                    suggestion: "Hold the device steady and try again.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        ClerkError::CaptureBusy => HumanError {
            message: "Still working on the last photo.".into(),
            suggestion: "Wait a moment for it to finish.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ClerkError::Torch(_) => HumanError {
            message: "The light could not be switched.".into(),
            suggestion: "You can still scan without it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ClerkError::InvalidCorners(_) | ClerkError::DegenerateQuad(_) => HumanError {
            message: "The page edges don't form a usable shape.".into(),
            suggestion: "Drag the four corners onto the corners of the page.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ClerkError::ImageError(_) | ClerkError::Enhancement { .. } => HumanError {
            message: "The scan could not be processed.".into(),
            suggestion: "Take the photo again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ClerkError::Config(detail) => HumanError {
            message: "The scanner settings are invalid.".into(),
            suggestion: format!("Reset the scanner settings. (Detail: {detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        ClerkError::Io(_) | ClerkError::Serialization(_) | ClerkError::Task(_) => HumanError {
            message: "Something went wrong inside the scanner.".into(),
            suggestion: "Try again. If this keeps happening, restart the app.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_action_required() {
        let human = humanize_error(&ClerkError::CaptureBusy);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.retriable);
    }

    #[test]
    fn revoked_permission_is_not_retriable() {
        let err = ClerkError::Capture("camera permission revoked".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn hardware_hiccup_is_transient() {
        let err = ClerkError::Capture("device busy".into());
        assert_eq!(humanize_error(&err).severity, Severity::Transient);
    }

    #[test]
    fn missing_camera_is_reported_plainly() {
        let human = humanize_error(&ClerkError::PlatformUnavailable);
        assert_eq!(human.message, "No camera is available.");
    }
}
