//! Frame sources for the CLI.
//!
//! Neither source talks to a camera: [`RawFileSource`] replays a
//! recording of tightly packed RGBA frames, and [`TestPatternSource`]
//! synthesizes a moving pattern so a strip can be exercised without
//! any input at all.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use lumisync_core::frame::BYTES_PER_PIXEL;
use lumisync_core::{Frame, FrameSource, Rgb, SyncError};

// ── RawFileSource ────────────────────────────────────────────────

/// Replays concatenated raw RGBA frames from a file, looping back to
/// the start at end of file.
pub struct RawFileSource {
    file: File,
    width: u32,
    height: u32,
    frame_len: usize,
}

impl RawFileSource {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self, SyncError> {
        let frame_len = width as usize * height as usize * BYTES_PER_PIXEL;
        if frame_len == 0 {
            return Err(SyncError::InvalidConfig(
                "frame dimensions must be nonzero".into(),
            ));
        }
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if (file_len as usize) < frame_len {
            return Err(SyncError::InvalidConfig(format!(
                "{} holds no complete {width}x{height} frame",
                path.display()
            )));
        }
        Ok(Self {
            file,
            width,
            height,
            frame_len,
        })
    }

    fn read_frame(&mut self) -> std::io::Result<Option<Frame>> {
        let mut data = vec![0u8; self.frame_len];
        match self.file.read_exact(&mut data) {
            Ok(()) => Ok(Some(Frame {
                width: self.width,
                height: self.height,
                data,
            })),
            // A trailing partial frame counts as end of file.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl FrameSource for RawFileSource {
    fn next_frame(&mut self) -> Result<Frame, SyncError> {
        if let Some(frame) = self.read_frame()? {
            return Ok(frame);
        }
        self.file.seek(SeekFrom::Start(0))?;
        match self.read_frame()? {
            Some(frame) => Ok(frame),
            None => Err(SyncError::InvalidConfig(
                "recording holds no complete frame".into(),
            )),
        }
    }
}

// ── TestPatternSource ────────────────────────────────────────────

/// Synthesizes uniform frames that walk the hue circle, one step per
/// frame.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    step: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            step: 0,
        }
    }

    /// Fully saturated color at `hue` degrees on the RGB hue circle.
    fn hue_color(hue: u32) -> Rgb {
        let sector = (hue % 360) / 60;
        let ramp = (((hue % 60) * 255) / 60) as u8;
        match sector {
            0 => Rgb::new(255, ramp, 0),
            1 => Rgb::new(255 - ramp, 255, 0),
            2 => Rgb::new(0, 255, ramp),
            3 => Rgb::new(0, 255 - ramp, 255),
            4 => Rgb::new(ramp, 0, 255),
            _ => Rgb::new(255, 0, 255 - ramp),
        }
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<Frame, SyncError> {
        let color = Self::hue_color(self.step * 3);
        self.step = self.step.wrapping_add(1);
        Ok(Frame::filled(self.width, self.height, color))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn raw_file_replays_and_loops() {
        let dir = std::env::temp_dir();
        let path = dir.join("lumisync-raw-source-test.rgba");
        let red = Frame::filled(2, 2, Rgb::new(255, 0, 0));
        let blue = Frame::filled(2, 2, Rgb::new(0, 0, 255));
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&red.data).unwrap();
            f.write_all(&blue.data).unwrap();
        }

        let mut source = RawFileSource::open(&path, 2, 2).unwrap();
        assert_eq!(source.next_frame().unwrap().data, red.data);
        assert_eq!(source.next_frame().unwrap().data, blue.data);
        // Loops back to the first frame.
        assert_eq!(source.next_frame().unwrap().data, red.data);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn raw_file_rejects_short_recording() {
        let dir = std::env::temp_dir();
        let path = dir.join("lumisync-raw-source-short.rgba");
        std::fs::write(&path, [0u8; 7]).unwrap();
        assert!(RawFileSource::open(&path, 2, 2).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_pattern_covers_primaries() {
        assert_eq!(TestPatternSource::hue_color(0), Rgb::new(255, 0, 0));
        assert_eq!(TestPatternSource::hue_color(120), Rgb::new(0, 255, 0));
        assert_eq!(TestPatternSource::hue_color(240), Rgb::new(0, 0, 255));
        assert_eq!(TestPatternSource::hue_color(360), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_pattern_frames_change() {
        let mut source = TestPatternSource::new(4, 4);
        let a = source.next_frame().unwrap();
        for _ in 0..30 {
            let _ = source.next_frame().unwrap();
        }
        let b = source.next_frame().unwrap();
        assert_ne!(a.data, b.data);
    }
}
