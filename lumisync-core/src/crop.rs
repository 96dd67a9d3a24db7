//! Calibrated capture quadrilateral and its pixel-space resolution.
//!
//! Calibration stores four fractional corner positions. Sampling uses
//! the axis-aligned bounding box of those corners — independent corner
//! rotation or perspective skew is *not* honored, only the min/max
//! extents are. The contract callers rely on:
//!
//! - corner coordinates are fractions of the frame, clamped to `[0, 1]`
//! - the resolved region is clamped to the frame and may be empty
//! - an empty region makes every extracted color black

use serde::{Deserialize, Serialize};

// ── CornerPoint ──────────────────────────────────────────────────

/// A corner position as a fraction of frame width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerPoint {
    pub x: f64,
    pub y: f64,
}

impl CornerPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

// ── CropCorners ──────────────────────────────────────────────────

/// The user-calibrated capture quadrilateral.
///
/// Absent until calibration completes; once set it persists until
/// calibration is explicitly reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropCorners {
    pub top_left: CornerPoint,
    pub top_right: CornerPoint,
    pub bottom_left: CornerPoint,
    pub bottom_right: CornerPoint,
}

impl CropCorners {
    /// A crop covering the entire frame.
    pub const fn full_frame() -> Self {
        Self {
            top_left: CornerPoint::new(0.0, 0.0),
            top_right: CornerPoint::new(1.0, 0.0),
            bottom_left: CornerPoint::new(0.0, 1.0),
            bottom_right: CornerPoint::new(1.0, 1.0),
        }
    }

    /// The default calibration starting quad: centered, 10 % margin.
    pub const fn centered() -> Self {
        Self {
            top_left: CornerPoint::new(0.1, 0.1),
            top_right: CornerPoint::new(0.9, 0.1),
            bottom_left: CornerPoint::new(0.1, 0.9),
            bottom_right: CornerPoint::new(0.9, 0.9),
        }
    }

    /// Resolve to the axis-aligned bounding box in pixel space,
    /// clamped to the frame. Collapses to an empty region when the
    /// corners cross after clamping.
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> ActiveRegion {
        let tl = self.top_left.clamped();
        let tr = self.top_right.clamped();
        let bl = self.bottom_left.clamped();
        let br = self.bottom_right.clamped();

        let min_x = tl.x.min(bl.x);
        let max_x = tr.x.max(br.x);
        let min_y = tl.y.min(tr.y);
        let max_y = bl.y.max(br.y);

        let x = (min_x * frame_width as f64).floor() as u32;
        let y = (min_y * frame_height as f64).floor() as u32;
        let width = ((max_x - min_x).max(0.0) * frame_width as f64).floor() as u32;
        let height = ((max_y - min_y).max(0.0) * frame_height as f64).floor() as u32;

        ActiveRegion {
            x: x.min(frame_width),
            y: y.min(frame_height),
            width: width.min(frame_width.saturating_sub(x)),
            height: height.min(frame_height.saturating_sub(y)),
        }
    }
}

// ── ActiveRegion ─────────────────────────────────────────────────

/// The pixel-space rectangle actually sampled: either the full frame
/// or the resolved crop bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ActiveRegion {
    /// The whole frame.
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// True when either dimension collapsed to zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ── Tests ────────────────────────────────────────────────────────
