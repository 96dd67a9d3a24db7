//! Device identity and the discovered-device registry.

use std::fmt;
use std::net::SocketAddr;

// ── DeviceId ─────────────────────────────────────────────────────

/// Opaque device identity, unique within one transport.
///
/// For datagram devices this defaults to the source IP when the
/// announce carries no `id`; for short-range devices it is the
/// platform link identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── DeviceAddress ────────────────────────────────────────────────

/// Transport-specific address of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddress {
    /// Peripheral link identifier assigned by the platform radio stack.
    ShortRange { link_id: String },
    /// UDP endpoint on the local network.
    Datagram { addr: SocketAddr },
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRange { link_id } => f.write_str(link_id),
            Self::Datagram { addr } => write!(f, "{addr}"),
        }
    }
}

// ── DeviceState ──────────────────────────────────────────────────

/// Connection state of a single discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Seen during a scan, never connected.
    #[default]
    Discovered,
    /// Connection attempt in flight.
    Connecting,
    /// The single active connection.
    Connected,
    /// Was connected earlier in this session.
    Disconnected,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "Discovered",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        };
        f.write_str(s)
    }
}

// ── DeviceDescriptor ─────────────────────────────────────────────

/// One discovered LED controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    pub address: DeviceAddress,
    /// Signal indicator from the most recent announce/advertisement.
    pub rssi: Option<i16>,
    pub state: DeviceState,
}

// ── DeviceRegistry ───────────────────────────────────────────────

/// De-duplicated list of devices seen by one transport.
///
/// Entries are only removed by an explicit [`clear`](Self::clear) —
/// they never expire silently, so a device that stops announcing
/// stays selectable.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly discovered device, or refresh the signal
    /// indicator of an existing entry with the same id.
    ///
    /// Returns `true` when the device is new.
    pub fn upsert(&mut self, device: DeviceDescriptor) -> bool {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.id == device.id) {
            existing.rssi = device.rssi.or(existing.rssi);
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == *id)
    }

    /// Update one device's state, returning the previous state.
    pub fn set_state(&mut self, id: &DeviceId, state: DeviceState) -> Option<DeviceState> {
        let device = self.devices.iter_mut().find(|d| d.id == *id)?;
        let previous = device.state;
        device.state = state;
        Some(previous)
    }

    /// Mark `id` as the single connected device; any other entry that
    /// was connected becomes `Disconnected`.
    pub fn mark_connected(&mut self, id: &DeviceId) {
        for device in &mut self.devices {
            if device.id == *id {
                device.state = DeviceState::Connected;
            } else if device.state == DeviceState::Connected {
                device.state = DeviceState::Disconnected;
            }
        }
    }

    /// The currently connected device, if any.
    pub fn connected(&self) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.state == DeviceState::Connected)
    }

    /// Explicit "clear list" action.
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────
