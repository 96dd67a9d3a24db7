//! Polymorphic device transports.
//!
//! Two variants speak the same color-frame protocol over very
//! different links:
//!
//! - [`ShortRangeTransport`] — a stateful wireless peripheral link
//!   (connect, characteristic writes with acknowledgment, link-loss
//!   notifications), with the platform radio stack injected as a
//!   [`LinkAdapter`].
//! - [`UdpTransport`] — connectionless local-network datagrams. Its
//!   "connected" state is a client-side bookkeeping fiction: connect
//!   only binds a local socket and records the target, and sends are
//!   fire-and-forget.
//!
//! Both enforce the single-connection rule: connecting to a new
//! device implicitly tears down the previous connection. Discovery
//! runs as a bounded background task; a new scan supersedes a running
//! one, and scanning while connected never disturbs the connection.

pub mod phase;
pub mod shortrange;
pub mod udp;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::device::{DeviceDescriptor, DeviceId, DeviceRegistry, DeviceState};
use crate::error::SyncError;
use crate::packet::ColorPacket;

pub use phase::LinkPhase;
pub use shortrange::{LinkAdapter, LinkAdvert, LinkSession, ShortRangeTransport};
pub use udp::{DEFAULT_SCAN_WINDOW, UdpTransport};

// ── TransportKind ────────────────────────────────────────────────

/// Which protocol variant a transport speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    ShortRange,
    Datagram,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortRange => write!(f, "short-range"),
            Self::Datagram => write!(f, "datagram"),
        }
    }
}

// ── TransportEvent ───────────────────────────────────────────────

/// Notifications surfaced to the UI collaborator.
///
/// Delivery is best-effort: a slow consumer drops events rather than
/// stalling the protocol.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A device was seen for the first time.
    DeviceFound(DeviceDescriptor),
    /// The discovery window ended (timeout or explicit stop).
    ScanFinished { devices: usize },
    /// The scan aborted on a transport error. Previously found
    /// devices are retained.
    ScanFailed(String),
    Connected(DeviceId),
    /// `link_lost` distinguishes an unsolicited drop from a
    /// user-initiated disconnect.
    Disconnected { id: DeviceId, link_lost: bool },
    /// A color frame failed to deliver. The connection state is
    /// unchanged; the next frame retries naturally.
    SendFailed(String),
}

pub type TransportEventSender = mpsc::Sender<TransportEvent>;

// ── TransportSnapshot ────────────────────────────────────────────

/// Read-only view of a transport's world for the UI collaborator.
#[derive(Debug, Clone)]
pub struct TransportSnapshot {
    pub kind: TransportKind,
    pub devices: Vec<DeviceDescriptor>,
    pub connected: Option<DeviceDescriptor>,
    pub scanning: bool,
}

// ── Transport ────────────────────────────────────────────────────

/// Capability contract shared by both variants: Discoverable,
/// Connectable, Sendable.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Start a bounded discovery window in the background,
    /// superseding any scan already running. Newly found devices are
    /// appended to the existing list, de-duplicated by identity.
    async fn start_scan(&self, window: Duration) -> Result<(), SyncError>;

    /// Stop a running scan. Safe to call when none is running; the
    /// underlying channel is released deterministically.
    async fn stop_scan(&self);

    /// Connect to a previously discovered device, implicitly
    /// disconnecting whichever device was connected before.
    async fn connect(&self, id: &DeviceId) -> Result<(), SyncError>;

    /// Tear down the active connection, if any.
    async fn disconnect(&self);

    /// Send one color frame to the connected device. Concurrent
    /// callers are serialized; a failure leaves the connection state
    /// unchanged.
    async fn send(&self, packet: &ColorPacket) -> Result<(), SyncError>;

    /// Explicit "clear list" action — the only way devices leave the
    /// list.
    fn clear_devices(&self);

    fn snapshot(&self) -> TransportSnapshot;
}

// ── TransportCore ────────────────────────────────────────────────

/// Bookkeeping shared by both variants: the device registry, the
/// lifecycle phase, the scanning flag, and event emission.
pub(crate) struct TransportCore {
    kind: TransportKind,
    registry: Mutex<DeviceRegistry>,
    phase: Mutex<LinkPhase>,
    scanning: AtomicBool,
    events: Mutex<Option<TransportEventSender>>,
}

impl TransportCore {
    pub(crate) fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            registry: Mutex::new(DeviceRegistry::new()),
            phase: Mutex::new(LinkPhase::default()),
            scanning: AtomicBool::new(false),
            events: Mutex::new(None),
        }
    }

    pub(crate) fn set_events(&self, tx: TransportEventSender) {
        *self.events.lock().expect("events lock") = Some(tx);
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().expect("events lock").as_ref() {
            // Best-effort: never block the protocol on the UI.
            let _ = tx.try_send(event);
        }
    }

    pub(crate) fn snapshot(&self) -> TransportSnapshot {
        let registry = self.registry.lock().expect("registry lock");
        TransportSnapshot {
            kind: self.kind,
            devices: registry.devices().to_vec(),
            connected: registry.connected().cloned(),
            scanning: self.scanning.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn clear_devices(&self) {
        self.registry.lock().expect("registry lock").clear();
    }

    // ── Scan bookkeeping ─────────────────────────────────────────

    /// Enter the scanning state. A scan beside an established
    /// connection sets only the flag, leaving `Connected` untouched.
    pub(crate) fn begin_scan(&self) -> Result<(), SyncError> {
        {
            let mut phase = self.phase.lock().expect("phase lock");
            if !phase.is_connected() {
                phase.begin_scan()?;
            }
        }
        self.scanning.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Record a found device; returns `true` (and emits
    /// [`TransportEvent::DeviceFound`]) when it was not known before.
    pub(crate) fn found_device(&self, device: DeviceDescriptor) -> bool {
        let new = self
            .registry
            .lock()
            .expect("registry lock")
            .upsert(device.clone());
        if new {
            self.emit(TransportEvent::DeviceFound(device));
        }
        new
    }

    /// Leave the scanning state (window expired or explicit stop).
    /// Emits at most one `ScanFinished` even when expiry and stop
    /// race.
    pub(crate) fn end_scan(&self) {
        if self.scanning.swap(false, Ordering::SeqCst) {
            let _ = self.phase.lock().expect("phase lock").finish_scan();
            let devices = self.registry.lock().expect("registry lock").len();
            self.emit(TransportEvent::ScanFinished { devices });
        }
    }

    /// Abort the scanning state on a transport error.
    pub(crate) fn scan_failed(&self, reason: String) {
        if self.scanning.swap(false, Ordering::SeqCst) {
            let _ = self.phase.lock().expect("phase lock").finish_scan();
            self.emit(TransportEvent::ScanFailed(reason));
        }
    }

    // ── Connection bookkeeping ───────────────────────────────────

    /// Begin connecting to `id`. Returns the device descriptor and
    /// its pre-connect state (restored by [`fail_connect`]).
    pub(crate) fn begin_connect(
        &self,
        id: &DeviceId,
    ) -> Result<(DeviceDescriptor, DeviceState), SyncError> {
        let mut registry = self.registry.lock().expect("registry lock");
        let device = registry
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::ConnectFailed(format!("unknown device {id}")))?;
        self.phase.lock().expect("phase lock").begin_connect()?;
        let previous = registry
            .set_state(id, DeviceState::Connecting)
            .unwrap_or_default();
        Ok((device, previous))
    }

    pub(crate) fn complete_connect(&self, id: &DeviceId) {
        let _ = self.phase.lock().expect("phase lock").complete_connect();
        self.registry
            .lock()
            .expect("registry lock")
            .mark_connected(id);
        self.emit(TransportEvent::Connected(id.clone()));
    }

    /// Roll back a failed connect attempt to the pre-connect state.
    pub(crate) fn fail_connect(&self, id: &DeviceId, previous: DeviceState) {
        let _ = self.phase.lock().expect("phase lock").fail_connect();
        self.registry.lock().expect("registry lock").set_state(id, previous);
    }

    /// Record that `id` is no longer connected, by user action or
    /// link loss.
    pub(crate) fn disconnected(&self, id: &DeviceId, link_lost: bool) {
        {
            let mut phase = self.phase.lock().expect("phase lock");
            if phase.disconnect().is_err() {
                phase.force_idle();
            }
        }
        self.registry
            .lock()
            .expect("registry lock")
            .set_state(id, DeviceState::Disconnected);
        self.emit(TransportEvent::Disconnected {
            id: id.clone(),
            link_lost,
        });
    }
}
