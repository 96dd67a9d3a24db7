//! Local-network datagram transport.
//!
//! Discovery broadcasts the [`DISCOVERY_PROBE`] marker to the local
//! broadcast address every few seconds for a bounded window while
//! listening for JSON announce replies on the same socket. Because
//! the probe goes out on the listen port, the transport hears its own
//! broadcast; it fails announce decoding and is dropped like any other
//! malformed datagram.
//!
//! "Connecting" to a device only binds a local ephemeral socket and
//! records the target address — datagrams are connectionless, so the
//! `Connected` state is client-side bookkeeping. Sends are
//! fire-and-forget: delivery and ordering are not guaranteed, and a
//! fresher frame shortly follows anything the network drops.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::device::{DeviceAddress, DeviceDescriptor, DeviceId, DeviceState};
use crate::error::SyncError;
use crate::packet::{ColorPacket, DEVICE_PORT, DISCOVERY_PORT, DISCOVERY_PROBE, DeviceAnnounce};
use crate::transport::{
    Transport, TransportCore, TransportEvent, TransportEventSender, TransportKind,
    TransportSnapshot,
};

// ── Constants ────────────────────────────────────────────────────

/// How often the probe is rebroadcast during a scan window.
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(3);

/// Default scan window length.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(30);

// ── UdpTransport ─────────────────────────────────────────────────

/// The datagram transport variant.
pub struct UdpTransport {
    core: Arc<TransportCore>,
    /// The single active target. The async mutex serializes senders
    /// so packets are never interleaved.
    conn: Mutex<Option<UdpConnection>>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
    broadcast_target: SocketAddr,
    listen_port: u16,
    probe_interval: Duration,
}

struct UdpConnection {
    socket: UdpSocket,
    target: SocketAddr,
    id: DeviceId,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpTransport {
    pub fn new() -> Self {
        Self {
            core: Arc::new(TransportCore::new(TransportKind::Datagram)),
            conn: Mutex::new(None),
            scan_task: Mutex::new(None),
            broadcast_target: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::BROADCAST),
                DISCOVERY_PORT,
            ),
            listen_port: DISCOVERY_PORT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Deliver transport events to `tx`.
    pub fn with_events(self, tx: TransportEventSender) -> Self {
        self.core.set_events(tx);
        self
    }

    /// Override where probes are sent and where replies are awaited
    /// (loopback endpoints in tests).
    pub fn with_discovery_endpoint(mut self, target: SocketAddr, listen_port: u16) -> Self {
        self.broadcast_target = target;
        self.listen_port = listen_port;
        self
    }

    /// Override the probe rebroadcast interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Register a known device without discovering it (e.g. a saved
    /// device from a previous session). Returns its id.
    pub fn register(&self, name: &str, addr: SocketAddr) -> DeviceId {
        let id = DeviceId::new(addr.ip().to_string());
        self.core.found_device(DeviceDescriptor {
            id: id.clone(),
            name: name.to_string(),
            address: DeviceAddress::Datagram { addr },
            rssi: None,
            state: DeviceState::Discovered,
        });
        id
    }

    /// Abort the scan task, if one is running, and settle the
    /// scanning state. The scan socket is owned by the task, so the
    /// abort is awaited: when this returns the port is free and a new
    /// scan can bind it immediately.
    async fn abort_scan(&self) {
        let mut slot = self.scan_task.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
            let _ = handle.await;
            self.core.end_scan();
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    async fn start_scan(&self, window: Duration) -> Result<(), SyncError> {
        self.abort_scan().await;
        self.core.begin_scan()?;

        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.listen_port)).await {
            Ok(s) => s,
            Err(e) => {
                self.core.scan_failed(e.to_string());
                return Err(SyncError::DiscoveryFailed(e.to_string()));
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            self.core.scan_failed(e.to_string());
            return Err(SyncError::DiscoveryFailed(e.to_string()));
        }

        let core = Arc::clone(&self.core);
        let target = self.broadcast_target;
        let probe_interval = self.probe_interval;
        let handle = tokio::spawn(async move {
            scan_loop(core, socket, target, probe_interval, window).await;
        });
        *self.scan_task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop_scan(&self) {
        self.abort_scan().await;
    }

    async fn connect(&self, id: &DeviceId) -> Result<(), SyncError> {
        // A connect attempt stops any active scan first.
        self.abort_scan().await;

        // Implicit teardown of the previous connection.
        if let Some(old) = self.conn.lock().await.take() {
            drop(old.socket);
            self.core.disconnected(&old.id, false);
        }

        let (device, previous) = self.core.begin_connect(id)?;
        let DeviceAddress::Datagram { addr } = device.address else {
            self.core.fail_connect(id, previous);
            return Err(SyncError::ConnectFailed(format!(
                "{id} is not a datagram device"
            )));
        };

        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(s) => s,
            Err(e) => {
                self.core.fail_connect(id, previous);
                return Err(SyncError::ConnectFailed(e.to_string()));
            }
        };

        *self.conn.lock().await = Some(UdpConnection {
            socket,
            target: addr,
            id: id.clone(),
        });
        self.core.complete_connect(id);
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(old) = self.conn.lock().await.take() {
            drop(old.socket);
            self.core.disconnected(&old.id, false);
        }
    }

    async fn send(&self, packet: &ColorPacket) -> Result<(), SyncError> {
        let conn = self.conn.lock().await;
        let Some(conn) = conn.as_ref() else {
            return Err(SyncError::SendFailed("no connected device".into()));
        };
        if let Err(e) = conn.socket.send_to(&packet.encode(), conn.target).await {
            self.core.emit(TransportEvent::SendFailed(e.to_string()));
            return Err(SyncError::SendFailed(e.to_string()));
        }
        Ok(())
    }

    fn clear_devices(&self) {
        self.core.clear_devices();
    }

    fn snapshot(&self) -> TransportSnapshot {
        self.core.snapshot()
    }
}

// ── Scan loop ────────────────────────────────────────────────────

/// Broadcast probes and collect announce replies until the window
/// elapses. Malformed replies (including our own echoed probe) are
/// dropped with a debug log; socket errors abort the scan.
async fn scan_loop(
    core: Arc<TransportCore>,
    socket: UdpSocket,
    target: SocketAddr,
    probe_interval: Duration,
    window: Duration,
) {
    let deadline = tokio::time::Instant::now() + window;
    let mut probe = tokio::time::interval(probe_interval);
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            _ = probe.tick() => {
                if let Err(e) = socket.send_to(DISCOVERY_PROBE, target).await {
                    warn!("discovery broadcast failed: {e}");
                    core.scan_failed(e.to_string());
                    return;
                }
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, src)) => match DeviceAnnounce::decode(&buf[..len]) {
                    Ok(announce) => {
                        core.found_device(describe(announce, src));
                    }
                    Err(e) => debug!("dropping datagram from {src}: {e}"),
                },
                Err(e) => {
                    warn!("discovery receive failed: {e}");
                    core.scan_failed(e.to_string());
                    return;
                }
            },
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    core.end_scan();
}

/// Build a descriptor from an announce, filling gaps from the
/// datagram's source address.
fn describe(announce: DeviceAnnounce, src: SocketAddr) -> DeviceDescriptor {
    let ip = src.ip();
    let port = announce.port.unwrap_or(DEVICE_PORT);
    DeviceDescriptor {
        id: DeviceId::new(announce.id.unwrap_or_else(|| ip.to_string())),
        name: announce.name.unwrap_or_else(|| format!("ESP LED ({ip})")),
        address: DeviceAddress::Datagram {
            addr: SocketAddr::new(ip, port),
        },
        rssi: announce.rssi,
        state: DeviceState::Discovered,
    }
}

// ── Tests ────────────────────────────────────────────────────────
