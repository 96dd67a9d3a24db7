//! The sync loop: frames in, color packets out.
//!
//! Each tick pulls one frame, extracts the region colors, and decides
//! whether the connected device needs to hear about it. Three things
//! trigger a send:
//!
//! - nothing was ever sent on this run,
//! - the colors moved further than the sensitivity threshold,
//! - the keepalive interval elapsed with no send.
//!
//! Sends are awaited one at a time, so packets reach the transport in
//! extraction order and a slow link backpressures the loop instead of
//! piling up stale frames. After a configurable run of consecutive
//! send failures the loop gives the device up for lost, disconnects,
//! and returns [`SyncError::LinkLost`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::color::RegionColors;
use crate::crop::CropCorners;
use crate::error::SyncError;
use crate::extract::extract;
use crate::frame::Frame;
use crate::packet::ColorPacket;
use crate::settings::AppSettings;
use crate::transport::Transport;

// ── FrameSource ──────────────────────────────────────────────────

/// Supplier of raw frames for the sync loop.
///
/// Implementations block the loop tick, so a source should return the
/// most recent frame it has rather than queue history.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, SyncError>;
}

impl FrameSource for Box<dyn FrameSource> {
    fn next_frame(&mut self) -> Result<Frame, SyncError> {
        (**self).next_frame()
    }
}

// ── SyncConfig ───────────────────────────────────────────────────

/// What the loop sends each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Four edge colors plus the dominant color.
    #[default]
    Regions,
    /// The dominant color only.
    Dominant,
}

/// Sync loop tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Extraction rate in frames per second, clamped to 10..=60.
    pub update_rate: u8,
    /// Change sensitivity, 1 (least) to 10 (most).
    pub sensitivity: u8,
    pub mode: SyncMode,
    /// Calibrated capture region, `None` for the full frame.
    pub crop: Option<CropCorners>,
    /// Resend the current colors after this long without a send.
    pub keepalive: Duration,
    /// Consecutive send failures before the link counts as lost.
    pub link_loss_after: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_rate: 30,
            sensitivity: 5,
            mode: SyncMode::Regions,
            crop: None,
            keepalive: Duration::from_secs(1),
            link_loss_after: 5,
        }
    }
}

impl SyncConfig {
    /// Derive loop tuning from persisted user settings.
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            update_rate: settings.update_rate,
            sensitivity: settings.sensitivity,
            crop: settings.crop_corners,
            ..Self::default()
        }
    }

    /// The per-channel delta a frame must exceed to trigger a send.
    ///
    /// Sensitivity 10 maps to 5 (almost everything sends), 1 maps to
    /// 50 (only large shifts send).
    pub fn threshold(&self) -> u8 {
        (11 - self.sensitivity.clamp(1, 10)) * 5
    }

    /// Target duration of one loop tick.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / u32::from(self.update_rate.clamp(10, 60))
    }
}

// ── SyncLoop ─────────────────────────────────────────────────────

/// Drives extraction and sending until stopped.
pub struct SyncLoop<S: FrameSource> {
    source: S,
    transport: Arc<dyn Transport>,
    config: SyncConfig,
    running: Arc<AtomicBool>,
    colors_tx: watch::Sender<Option<RegionColors>>,
}

impl<S: FrameSource> SyncLoop<S> {
    pub fn new(source: S, transport: Arc<dyn Transport>, config: SyncConfig) -> Self {
        let (colors_tx, _) = watch::channel(None);
        Self {
            source,
            transport,
            config,
            running: Arc::new(AtomicBool::new(false)),
            colors_tx,
        }
    }

    /// Handle that stops the loop from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Observe the most recently extracted colors (e.g. for a preview
    /// surface). `None` until the first extraction.
    pub fn colors(&self) -> watch::Receiver<Option<RegionColors>> {
        self.colors_tx.subscribe()
    }

    /// Run until [`stop`](Self::stop) is called, the frame source
    /// fails, or the link is lost.
    pub async fn run(&mut self) -> Result<(), SyncError> {
        let interval = self.config.frame_interval();
        let threshold = self.config.threshold();
        self.running.store(true, Ordering::SeqCst);
        info!(
            rate = self.config.update_rate,
            threshold, "sync loop started"
        );

        let mut last_sent: Option<RegionColors> = None;
        let mut last_send_at = Instant::now();
        let mut failures: u32 = 0;

        while self.running.load(Ordering::SeqCst) {
            let loop_start = Instant::now();

            let frame = self.source.next_frame()?;
            let pixels = frame.as_pixels()?;
            let colors = extract(&pixels, self.config.crop.as_ref());
            self.colors_tx.send_replace(Some(colors));

            let should_send = match &last_sent {
                None => true,
                Some(prev) => {
                    prev.max_channel_delta(&colors) > threshold
                        || last_send_at.elapsed() >= self.config.keepalive
                }
            };

            if should_send {
                let packet = match self.config.mode {
                    SyncMode::Regions => ColorPacket::regions(&colors),
                    SyncMode::Dominant => ColorPacket::Single(colors.dominant),
                };
                match self.transport.send(&packet).await {
                    Ok(()) => {
                        failures = 0;
                        last_sent = Some(colors);
                        last_send_at = Instant::now();
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(failures, "send failed: {e}");
                        if failures >= self.config.link_loss_after {
                            self.running.store(false, Ordering::SeqCst);
                            self.transport.disconnect().await;
                            return Err(SyncError::LinkLost);
                        }
                    }
                }
            } else {
                debug!("frame below threshold, suppressed");
            }

            Self::pace(loop_start, interval).await;
        }

        info!("sync loop stopped");
        Ok(())
    }

    /// Sleep out the remainder of the tick.
    async fn pace(loop_start: Instant, interval: Duration) {
        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
