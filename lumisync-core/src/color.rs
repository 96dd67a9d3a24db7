//! RGB color values, hex notation, and the per-extraction result set.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Rgb ──────────────────────────────────────────────────────────

/// An 8-bit-per-channel RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `"#rrggbb"` (leading `#` optional, case-insensitive).
    ///
    /// Returns `None` for anything that is not exactly six hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
        let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
        let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Format as lowercase `"#rrggbb"`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Largest absolute per-channel difference between two colors.
    pub fn channel_delta(self, other: Self) -> u8 {
        let d = |a: u8, b: u8| a.abs_diff(b);
        d(self.r, other.r).max(d(self.g, other.g)).max(d(self.b, other.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ── RegionColors ─────────────────────────────────────────────────

/// One extraction result: the four edge-band averages plus the
/// dominant (whole-area) average.
///
/// Produced fresh on every extraction; immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionColors {
    pub top: Rgb,
    pub right: Rgb,
    pub bottom: Rgb,
    pub left: Rgb,
    pub dominant: Rgb,
}

impl RegionColors {
    pub const BLACK: RegionColors = RegionColors {
        top: Rgb::BLACK,
        right: Rgb::BLACK,
        bottom: Rgb::BLACK,
        left: Rgb::BLACK,
        dominant: Rgb::BLACK,
    };

    /// All five regions set to the same color.
    pub const fn uniform(color: Rgb) -> Self {
        Self {
            top: color,
            right: color,
            bottom: color,
            left: color,
            dominant: color,
        }
    }

    /// Largest per-channel difference across all five regions.
    ///
    /// This is the quantity the sync loop compares against the
    /// sensitivity threshold.
    pub fn max_channel_delta(&self, other: &Self) -> u8 {
        self.top
            .channel_delta(other.top)
            .max(self.right.channel_delta(other.right))
            .max(self.bottom.channel_delta(other.bottom))
            .max(self.left.channel_delta(other.left))
            .max(self.dominant.channel_delta(other.dominant))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let c = Rgb::new(255, 0, 128);
        assert_eq!(c.to_hex(), "#ff0080");
        assert_eq!(Rgb::from_hex("#ff0080"), Some(c));
        assert_eq!(Rgb::from_hex("FF0080"), Some(c));
    }

    #[test]
    fn hex_rejects_malformed() {
        assert_eq!(Rgb::from_hex(""), None);
        assert_eq!(Rgb::from_hex("#fff"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
        assert_eq!(Rgb::from_hex("#ff00001"), None);
    }

    #[test]
    fn channel_delta_is_max_abs_diff() {
        let a = Rgb::new(10, 200, 50);
        let b = Rgb::new(15, 100, 55);
        assert_eq!(a.channel_delta(b), 100);
        assert_eq!(b.channel_delta(a), 100);
    }

    #[test]
    fn region_delta_spans_all_regions() {
        let base = RegionColors::uniform(Rgb::new(10, 10, 10));
        let mut moved = base;
        moved.left = Rgb::new(10, 10, 90);
        assert_eq!(base.max_channel_delta(&moved), 80);
        assert_eq!(base.max_channel_delta(&base), 0);
    }

    #[test]
    fn display_matches_hex() {
        assert_eq!(Rgb::new(0, 255, 0).to_string(), "#00ff00");
    }
}
