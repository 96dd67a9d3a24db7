//! # lumisync-core
//!
//! Core library for syncing ambient LED controllers to camera frames.
//!
//! This crate contains:
//! - **Color**: `Rgb`, hex parsing, and the `RegionColors` result set
//! - **Frame**: `PixelBuffer` / `Frame` raw RGBA representations
//! - **Crop**: calibrated capture region resolved to pixel rectangles
//! - **Extract**: edge-band and dominant color averaging
//! - **Packet**: the device wire protocol (color frames and the
//!   discovery announce)
//! - **Device**: device identity and the discovered-device registry
//! - **Transport**: `Transport` trait with short-range wireless and
//!   UDP datagram variants
//! - **Sync**: `SyncLoop` driving extraction and change-gated sends
//! - **Settings**: persisted user preferences
//! - **Error**: `SyncError` — typed, `thiserror`-based error hierarchy

pub mod color;
pub mod crop;
pub mod device;
pub mod error;
pub mod extract;
pub mod frame;
pub mod packet;
pub mod settings;
pub mod sync;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use color::{RegionColors, Rgb};
pub use crop::{ActiveRegion, CornerPoint, CropCorners};
pub use device::{DeviceAddress, DeviceDescriptor, DeviceId, DeviceRegistry, DeviceState};
pub use error::SyncError;
pub use extract::extract;
pub use frame::{BYTES_PER_PIXEL, Frame, PixelBuffer};
pub use packet::{
    ColorPacket, DEVICE_PORT, DISCOVERY_PORT, DISCOVERY_PROBE, DeviceAnnounce,
};
pub use settings::{AppSettings, CameraFacing};
pub use sync::{FrameSource, SyncConfig, SyncLoop, SyncMode};
pub use transport::{
    DEFAULT_SCAN_WINDOW, LinkAdapter, LinkAdvert, LinkPhase, LinkSession, ShortRangeTransport,
    Transport, TransportEvent, TransportEventSender, TransportKind, TransportSnapshot,
    UdpTransport,
};
