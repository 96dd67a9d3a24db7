//! Raw camera frame representations.
//!
//! [`PixelBuffer`] is a borrowed view over one tightly packed RGBA
//! frame — the extractor works on it and keeps nothing past return.
//! [`Frame`] is the owned form a [`FrameSource`](crate::sync::FrameSource)
//! hands to the sync loop.

use crate::color::Rgb;
use crate::error::SyncError;

/// Bytes per pixel in the `[R, G, B, A]` layout.
pub const BYTES_PER_PIXEL: usize = 4;

// ── PixelBuffer ──────────────────────────────────────────────────

/// A borrowed, immutable RGBA frame.
///
/// Rows are tightly packed: byte offset of `(x, y)` is
/// `(y * width + x) * 4`. The alpha channel is carried but ignored by
/// the extractor.
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
    /// Wrap a raw RGBA byte slice.
    ///
    /// Fails if `data` is shorter than `width * height * 4` bytes.
    /// Extra trailing bytes are tolerated and ignored.
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Self, SyncError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() < expected {
            return Err(SyncError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The RGB value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn rgb_at(&self, x: u32, y: u32) -> Rgb {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Rgb::new(self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// An owned RGBA frame produced by a frame source.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data — `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// A black frame of the given size.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// A frame filled with a single color (alpha 255).
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Borrow this frame as a [`PixelBuffer`].
    pub fn as_pixels(&self) -> Result<PixelBuffer<'_>, SyncError> {
        PixelBuffer::new(self.width, self.height, &self.data)
    }
}

// ── Tests ────────────────────────────────────────────────────────
