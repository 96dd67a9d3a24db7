//! Edge-region color extraction.
//!
//! Samples the four edge bands and the whole-area average of the
//! active capture region, the way a TV-backlight rig samples screen
//! borders:
//!
//! ```text
//!        ┌────────── top (inner 80 % of width) ──────────┐
//!        │╔══════════════════════════════════════════════╗│
//!   left ││                                              ││ right
//!  (80 % ││              dominant = whole area           ││
//! height)││                                              ││
//!        │╚══════════════════════════════════════════════╝│
//!        └──────────────────── bottom ────────────────────┘
//! ```
//!
//! Edge bands are 10 % of the smaller region dimension thick (at least
//! one pixel) and leave a 10 % margin on each end so corners are not
//! double-counted. Averaging samples every second pixel on both axes.
//!
//! Extraction is pure and never fails: empty regions and zero-sample
//! bands degrade to black.

use crate::color::{Rgb, RegionColors};
use crate::crop::{ActiveRegion, CropCorners};
use crate::frame::PixelBuffer;

/// Edge band thickness as a fraction of the smaller region dimension.
const EDGE_THICKNESS: f64 = 0.1;
/// Margin skipped at each end of an edge band.
const EDGE_MARGIN: f64 = 0.1;
/// Fraction of the region span an edge band covers.
const EDGE_SPAN: f64 = 0.8;
/// Sampling stride in pixels, both axes.
const SAMPLE_STRIDE: u32 = 2;

/// Compute the five region averages for one frame.
///
/// With no crop the active region is the full frame; otherwise it is
/// the crop's bounding box (see [`CropCorners::resolve`]). Safe to
/// call from any thread — no shared state.
pub fn extract(frame: &PixelBuffer<'_>, crop: Option<&CropCorners>) -> RegionColors {
    let region = match crop {
        Some(corners) => corners.resolve(frame.width(), frame.height()),
        None => ActiveRegion::full(frame.width(), frame.height()),
    };

    if region.is_empty() {
        return RegionColors::BLACK;
    }

    let rx = region.x as f64;
    let ry = region.y as f64;
    let rw = region.width as f64;
    let rh = region.height as f64;

    // Band thickness; a region too small for a 10 % band still
    // samples one pixel row/column.
    let thickness = ((region.width.min(region.height) as f64 * EDGE_THICKNESS).floor()).max(1.0);

    let top = average(frame, rx + rw * EDGE_MARGIN, ry, rw * EDGE_SPAN, thickness);
    let bottom = average(
        frame,
        rx + rw * EDGE_MARGIN,
        ry + rh - thickness,
        rw * EDGE_SPAN,
        thickness,
    );
    let left = average(frame, rx, ry + rh * EDGE_MARGIN, thickness, rh * EDGE_SPAN);
    let right = average(
        frame,
        rx + rw - thickness,
        ry + rh * EDGE_MARGIN,
        thickness,
        rh * EDGE_SPAN,
    );
    let dominant = average(frame, rx, ry, rw, rh);

    RegionColors {
        top,
        right,
        bottom,
        left,
        dominant,
    }
}

/// Stride-2 arithmetic mean over a fractional rectangle, clamped to
/// the frame. Zero sampled pixels yield black.
fn average(frame: &PixelBuffer<'_>, x: f64, y: f64, width: f64, height: f64) -> Rgb {
    let start_x = x.max(0.0).floor() as u32;
    let start_y = y.max(0.0).floor() as u32;
    let end_x = frame.width().min(start_x.saturating_add(width.max(0.0).floor() as u32));
    let end_y = frame.height().min(start_y.saturating_add(height.max(0.0).floor() as u32));

    let mut r: u64 = 0;
    let mut g: u64 = 0;
    let mut b: u64 = 0;
    let mut count: u64 = 0;

    let mut py = start_y;
    while py < end_y {
        let mut px = start_x;
        while px < end_x {
            let c = frame.rgb_at(px, py);
            r += u64::from(c.r);
            g += u64::from(c.g);
            b += u64::from(c.b);
            count += 1;
            px += SAMPLE_STRIDE;
        }
        py += SAMPLE_STRIDE;
    }

    if count == 0 {
        return Rgb::BLACK;
    }

    Rgb::new(mean(r, count), mean(g, count), mean(b, count))
}

/// Rounded-to-nearest channel mean, clamped to `0..=255`.
fn mean(sum: u64, count: u64) -> u8 {
    ((sum as f64 / count as f64).round()).clamp(0.0, 255.0) as u8
}

// ── Tests ────────────────────────────────────────────────────────
