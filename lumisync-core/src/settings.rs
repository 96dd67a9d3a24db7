//! User-tunable application settings.
//!
//! The JSON shape matches what a companion UI persists, so a settings
//! blob saved elsewhere deserializes directly. Every field carries a
//! default and a missing or partial document falls back field by
//! field.

use serde::{Deserialize, Serialize};

use crate::crop::CropCorners;

// ── CameraFacing ─────────────────────────────────────────────────

/// Which camera the frame source reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

// ── AppSettings ──────────────────────────────────────────────────

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    /// Color change sensitivity, 1 (least) to 10 (most).
    pub sensitivity: u8,
    /// Extraction rate in frames per second, 10 to 60.
    pub update_rate: u8,
    /// Whether output brightness tracks the extracted color.
    pub brightness_auto: bool,
    pub camera_facing: CameraFacing,
    /// Calibrated capture region, `None` until calibration ran.
    pub crop_corners: Option<CropCorners>,
    pub is_calibrated: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            sensitivity: 5,
            update_rate: 30,
            brightness_auto: true,
            camera_facing: CameraFacing::Back,
            crop_corners: None,
            is_calibrated: false,
        }
    }
}

impl AppSettings {
    /// Clamp out-of-range values into their documented bounds.
    pub fn clamped(mut self) -> Self {
        self.sensitivity = self.sensitivity.clamp(1, 10);
        self.update_rate = self.update_rate.clamp(10, 60);
        self
    }

    /// Store a calibration result.
    pub fn set_calibration(&mut self, corners: CropCorners) {
        self.crop_corners = Some(corners);
        self.is_calibrated = true;
    }

    /// Forget the calibration and fall back to the full frame.
    pub fn reset_calibration(&mut self) {
        self.crop_corners = None;
        self.is_calibrated = false;
    }
}

// ── Tests ────────────────────────────────────────────────────────
