//! On-wire color frames and the discovery protocol.
//!
//! Both transports carry the same raw byte payloads; the command byte
//! tells the receiver the total length, so no length prefix is needed.
//!
//! ## Wire format
//!
//! **Single-color frame** (4 bytes):
//! ```text
//! command:  u8   (0x00)
//! r, g, b:  u8 × 3
//! ```
//!
//! **Region frame** (13 bytes), region order fixed top → right →
//! bottom → left:
//! ```text
//! command:  u8   (0x01)
//! top:      u8 × 3 (r, g, b)
//! right:    u8 × 3
//! bottom:   u8 × 3
//! left:     u8 × 3
//! ```
//!
//! **Discovery** is a broadcast of the literal marker
//! [`DISCOVERY_PROBE`]; devices answer with a JSON
//! [`DeviceAnnounce`]. Anything else is dropped.

use serde::Deserialize;

use crate::color::{Rgb, RegionColors};
use crate::error::SyncError;

// ── Constants ────────────────────────────────────────────────────

/// Broadcast marker soliciting device announcements.
pub const DISCOVERY_PROBE: &[u8] = b"ESP_LED_DISCOVERY";

/// Well-known broadcast port for discovery probes and replies.
pub const DISCOVERY_PORT: u16 = 7778;

/// Default port a device accepts color frames on.
pub const DEVICE_PORT: u16 = 7777;

const CMD_SINGLE: u8 = 0x00;
const CMD_REGIONS: u8 = 0x01;

// ── ColorPacket ──────────────────────────────────────────────────

/// One color update for the LED controller.
///
/// Ephemeral: constructed, sent, discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPacket {
    /// Drive the whole strip with one color.
    Single(Rgb),
    /// Drive the four edge zones independently.
    Regions {
        top: Rgb,
        right: Rgb,
        bottom: Rgb,
        left: Rgb,
    },
}

impl ColorPacket {
    /// Encoded size of a [`ColorPacket::Single`] frame.
    pub const SINGLE_SIZE: usize = 4;

    /// Encoded size of a [`ColorPacket::Regions`] frame.
    pub const REGIONS_SIZE: usize = 13;

    /// Build a region frame from an extraction result (the dominant
    /// color is not carried on the wire).
    pub fn regions(colors: &RegionColors) -> Self {
        Self::Regions {
            top: colors.top,
            right: colors.right,
            bottom: colors.bottom,
            left: colors.left,
        }
    }

    /// Size of this packet on the wire.
    pub const fn encoded_len(&self) -> usize {
        match self {
            Self::Single(_) => Self::SINGLE_SIZE,
            Self::Regions { .. } => Self::REGIONS_SIZE,
        }
    }

    /// Serialize to the fixed byte layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        match *self {
            Self::Single(c) => {
                buf.extend_from_slice(&[CMD_SINGLE, c.r, c.g, c.b]);
            }
            Self::Regions {
                top,
                right,
                bottom,
                left,
            } => {
                buf.push(CMD_REGIONS);
                for c in [top, right, bottom, left] {
                    buf.extend_from_slice(&[c.r, c.g, c.b]);
                }
            }
        }
        buf
    }

    /// Deserialize from bytes.
    ///
    /// Rejects unknown command bytes and any length other than the
    /// exact frame size for the command.
    pub fn decode(data: &[u8]) -> Result<Self, SyncError> {
        match data.first() {
            Some(&CMD_SINGLE) => {
                if data.len() != Self::SINGLE_SIZE {
                    return Err(SyncError::DecodeFailed(format!(
                        "single-color frame must be {} bytes, got {}",
                        Self::SINGLE_SIZE,
                        data.len(),
                    )));
                }
                Ok(Self::Single(Rgb::new(data[1], data[2], data[3])))
            }
            Some(&CMD_REGIONS) => {
                if data.len() != Self::REGIONS_SIZE {
                    return Err(SyncError::DecodeFailed(format!(
                        "region frame must be {} bytes, got {}",
                        Self::REGIONS_SIZE,
                        data.len(),
                    )));
                }
                let rgb = |i: usize| Rgb::new(data[i], data[i + 1], data[i + 2]);
                Ok(Self::Regions {
                    top: rgb(1),
                    right: rgb(4),
                    bottom: rgb(7),
                    left: rgb(10),
                })
            }
            Some(&cmd) => Err(SyncError::DecodeFailed(format!(
                "unknown command byte {cmd:#04x}"
            ))),
            None => Err(SyncError::DecodeFailed("empty packet".into())),
        }
    }
}

// ── DeviceAnnounce ───────────────────────────────────────────────

/// JSON payload a device replies with during discovery.
///
/// All fields except `type` are optional; the transport fills the
/// gaps from the datagram's source address.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAnnounce {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub rssi: Option<i16>,
}

/// Announce `type` values accepted from devices.
const ANNOUNCE_KINDS: [&str; 2] = ["ESP_LED_DEVICE", "device-announce"];

impl DeviceAnnounce {
    /// Parse a discovery response.
    ///
    /// Non-JSON payloads (including our own echoed probe) and unknown
    /// `type` values are rejected; callers drop these silently.
    pub fn decode(data: &[u8]) -> Result<Self, SyncError> {
        let announce: DeviceAnnounce = serde_json::from_slice(data)
            .map_err(|e| SyncError::DecodeFailed(e.to_string()))?;
        if !ANNOUNCE_KINDS.contains(&announce.kind.as_str()) {
            return Err(SyncError::DecodeFailed(format!(
                "unknown announce type {:?}",
                announce.kind
            )));
        }
        Ok(announce)
    }
}

// ── Tests ────────────────────────────────────────────────────────
