//! Short-range wireless (peripheral link) transport.
//!
//! The platform radio stack is an external collaborator injected as a
//! [`LinkAdapter`]: it performs the passive advertisement listen,
//! establishes links, and negotiates the write characteristic. This
//! transport owns everything above that seam — the device list, the
//! single-connection rule, link-loss handling, and send
//! serialization.
//!
//! Unlike the datagram variant this link is stateful: connect really
//! establishes a session, every write is acknowledged by the
//! peripheral, and the adapter resolves [`LinkSession::closed`] when
//! the remote end drops the link.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::device::{DeviceAddress, DeviceDescriptor, DeviceId, DeviceState};
use crate::error::SyncError;
use crate::packet::ColorPacket;
use crate::transport::{
    Transport, TransportCore, TransportEvent, TransportEventSender, TransportKind,
    TransportSnapshot,
};

// ── Adapter seam ─────────────────────────────────────────────────

/// One advertisement heard while scanning.
#[derive(Debug, Clone)]
pub struct LinkAdvert {
    /// Platform-assigned peripheral identifier.
    pub link_id: String,
    /// Advertised device name, if the peripheral broadcasts one.
    pub name: Option<String>,
    /// Signal strength at the time of the advertisement.
    pub rssi: Option<i16>,
}

/// Platform radio stack.
///
/// Implementations wrap whatever the host OS exposes for short-range
/// wireless. The contract:
///
/// - [`start_scan`](Self::start_scan) begins a passive listen and
///   returns a channel of adverts. It must fail with
///   [`SyncError::PermissionDenied`] *before* returning the channel
///   if the platform refuses the radio/location permission, so the
///   caller can report it once. The adapter closes the channel when
///   `window` elapses or [`stop_scan`](Self::stop_scan) is called.
/// - [`connect`](Self::connect) establishes the link and negotiates
///   the color write characteristic before returning the session.
#[async_trait]
pub trait LinkAdapter: Send + Sync {
    async fn start_scan(&self, window: Duration)
    -> Result<mpsc::Receiver<LinkAdvert>, SyncError>;

    async fn stop_scan(&self);

    async fn connect(&self, link_id: &str) -> Result<Box<dyn LinkSession>, SyncError>;
}

/// An established peripheral link.
#[async_trait]
pub trait LinkSession: Send + Sync {
    /// Write one encoded packet to the color characteristic, awaiting
    /// the peripheral's acknowledgment.
    async fn write(&self, payload: &[u8]) -> Result<(), SyncError>;

    /// Resolves when the peripheral drops the link (never for a
    /// locally initiated close).
    async fn closed(&self);

    /// Tear the link down.
    async fn close(&self);
}

// ── ShortRangeTransport ──────────────────────────────────────────

/// The short-range transport variant.
pub struct ShortRangeTransport {
    core: Arc<TransportCore>,
    adapter: Arc<dyn LinkAdapter>,
    /// The single active session. The async mutex serializes writers
    /// so packets are never interleaved.
    session: Arc<Mutex<Option<ActiveLink>>>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every connect/disconnect so a stale link-loss
    /// watcher cannot tear down a newer session.
    generation: Arc<AtomicU64>,
}

struct ActiveLink {
    id: DeviceId,
    link: Arc<dyn LinkSession>,
}

impl ShortRangeTransport {
    pub fn new(adapter: Arc<dyn LinkAdapter>) -> Self {
        Self {
            core: Arc::new(TransportCore::new(TransportKind::ShortRange)),
            adapter,
            session: Arc::new(Mutex::new(None)),
            scan_task: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver transport events to `tx`.
    pub fn with_events(self, tx: TransportEventSender) -> Self {
        self.core.set_events(tx);
        self
    }

    /// Stop the adapter scan and the advert consumer, settling the
    /// scanning state exactly once.
    async fn abort_scan(&self) {
        let mut slot = self.scan_task.lock().await;
        if let Some(handle) = slot.take() {
            self.adapter.stop_scan().await;
            handle.abort();
            self.core.end_scan();
        }
    }

    /// Close the active session, if any. `link_lost` is false here by
    /// definition — loss is only ever reported by the watcher.
    async fn teardown_session(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            active.link.close().await;
            self.core.disconnected(&active.id, false);
        }
    }
}

#[async_trait]
impl Transport for ShortRangeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ShortRange
    }

    async fn start_scan(&self, window: Duration) -> Result<(), SyncError> {
        self.abort_scan().await;

        // Permission refusal surfaces here, before anything starts.
        let mut adverts = self.adapter.start_scan(window).await?;
        self.core.begin_scan()?;

        let core = Arc::clone(&self.core);
        let handle = tokio::spawn(async move {
            while let Some(advert) = adverts.recv().await {
                debug!(link_id = %advert.link_id, "advertisement");
                core.found_device(describe(advert));
            }
            // Channel closed: window elapsed or adapter stopped.
            core.end_scan();
        });
        *self.scan_task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop_scan(&self) {
        self.abort_scan().await;
    }

    async fn connect(&self, id: &DeviceId) -> Result<(), SyncError> {
        self.abort_scan().await;
        self.teardown_session().await;

        let (device, previous) = self.core.begin_connect(id)?;
        let DeviceAddress::ShortRange { link_id } = &device.address else {
            self.core.fail_connect(id, previous);
            return Err(SyncError::ConnectFailed(format!(
                "{id} is not a short-range device"
            )));
        };

        let link: Arc<dyn LinkSession> = match self.adapter.connect(link_id).await {
            Ok(link) => Arc::from(link),
            Err(e) => {
                self.core.fail_connect(id, previous);
                return Err(e);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.session.lock().await = Some(ActiveLink {
            id: id.clone(),
            link: Arc::clone(&link),
        });
        self.core.complete_connect(id);

        // Link-loss watcher: forces Idle and reports the drop as
        // distinct from a user disconnect. The generation check makes
        // a watcher for a superseded session a no-op.
        let core = Arc::clone(&self.core);
        let session = Arc::clone(&self.session);
        let generations = Arc::clone(&self.generation);
        let id = id.clone();
        tokio::spawn(async move {
            link.closed().await;
            if generations.load(Ordering::SeqCst) == generation {
                session.lock().await.take();
                core.disconnected(&id, true);
            }
        });

        Ok(())
    }

    async fn disconnect(&self) {
        self.teardown_session().await;
    }

    async fn send(&self, packet: &ColorPacket) -> Result<(), SyncError> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            return Err(SyncError::SendFailed("no connected device".into()));
        };
        if let Err(e) = active.link.write(&packet.encode()).await {
            self.core.emit(TransportEvent::SendFailed(e.to_string()));
            return Err(e);
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

fn describe(advert: LinkAdvert) -> DeviceDescriptor {
    DeviceDescriptor {
        id: DeviceId::new(advert.link_id.clone()),
        name: advert
            .name
            .unwrap_or_else(|| format!("LED controller ({})", advert.link_id)),
        address: DeviceAddress::ShortRange {
            link_id: advert.link_id,
        },
        rssi: advert.rssi,
        state: DeviceState::Discovered,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::transport::TransportEvent;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};

    // ── Mock adapter ─────────────────────────────────────────────

    #[derive(Default)]
    struct MockSession {
        written: StdMutex<Vec<Vec<u8>>>,
        lost: Notify,
        closed_by_host: AtomicBool,
        fail_writes: AtomicBool,
    }

    struct SessionHandle(Arc<MockSession>);

    #[async_trait]
    impl LinkSession for SessionHandle {
        async fn write(&self, payload: &[u8]) -> Result<(), SyncError> {
            if self.0.fail_writes.load(Ordering::SeqCst) {
                return Err(SyncError::SendFailed("write not acknowledged".into()));
            }
            self.0.written.lock().unwrap().push(payload.to_vec());
            Ok(())
        }

        async fn closed(&self) {
            self.0.lost.notified().await;
        }

        async fn close(&self) {
            self.0.closed_by_host.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockAdapter {
        adverts: Vec<LinkAdvert>,
        deny_permission: bool,
        sessions: StdMutex<HashMap<String, Arc<MockSession>>>,
    }

    impl MockAdapter {
        fn advertising(ids: &[&str]) -> Self {
            Self {
                adverts: ids
                    .iter()
                    .map(|id| LinkAdvert {
                        link_id: (*id).to_string(),
                        name: Some(format!("Strip {id}")),
                        rssi: Some(-50),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn session(&self, link_id: &str) -> Arc<MockSession> {
            Arc::clone(&self.sessions.lock().unwrap()[link_id])
        }
    }

    #[async_trait]
    impl LinkAdapter for MockAdapter {
        async fn start_scan(
            &self,
            _window: Duration,
        ) -> Result<mpsc::Receiver<LinkAdvert>, SyncError> {
            if self.deny_permission {
                return Err(SyncError::PermissionDenied("radio scan"));
            }
            let (tx, rx) = mpsc::channel(16);
            let adverts = self.adverts.clone();
            tokio::spawn(async move {
                for advert in adverts {
                    if tx.send(advert).await.is_err() {
                        break;
                    }
                }
                // tx drops here: window over.
            });
            Ok(rx)
        }

        async fn stop_scan(&self) {}

        async fn connect(&self, link_id: &str) -> Result<Box<dyn LinkSession>, SyncError> {
            if link_id == "unreachable" {
                return Err(SyncError::ConnectFailed("peripheral did not respond".into()));
            }
            let session = Arc::new(MockSession::default());
            self.sessions
                .lock()
                .unwrap()
                .insert(link_id.to_string(), Arc::clone(&session));
            Ok(Box::new(SessionHandle(session)))
        }
    }

    async fn scanned_transport(adapter: Arc<MockAdapter>) -> ShortRangeTransport {
        let transport = ShortRangeTransport::new(adapter);
        transport
            .start_scan(Duration::from_millis(200))
            .await
            .unwrap();
        // The mock closes the advert channel as soon as all adverts
        // are delivered, so this settles quickly.
        sleep(Duration::from_millis(50)).await;
        transport
    }

    // ── Tests ────────────────────────────────────────────────────

    #[tokio::test]
    async fn scan_populates_and_deduplicates() {
        let adapter = Arc::new(MockAdapter::advertising(&["lamp-1", "lamp-2", "lamp-1"]));
        let transport = scanned_transport(adapter).await;

        let snap = transport.snapshot();
        assert_eq!(snap.devices.len(), 2);
        assert!(!snap.scanning);
        assert!(snap.connected.is_none());
    }

    #[tokio::test]
    async fn permission_refusal_is_synchronous() {
        let adapter = Arc::new(MockAdapter {
            deny_permission: true,
            ..MockAdapter::default()
        });
        let transport = ShortRangeTransport::new(adapter);
        let err = transport
            .start_scan(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied(_)));
        assert!(!transport.snapshot().scanning);
    }

    #[tokio::test]
    async fn connect_and_send_writes_acknowledged_packets() {
        let adapter = Arc::new(MockAdapter::advertising(&["lamp-1"]));
        let transport = scanned_transport(Arc::clone(&adapter)).await;

        transport.connect(&DeviceId::from("lamp-1")).await.unwrap();
        transport
            .send(&ColorPacket::Single(Rgb::new(0, 255, 0)))
            .await
            .unwrap();

        let written = adapter.session("lamp-1").written.lock().unwrap().clone();
        assert_eq!(written, vec![vec![0, 0, 255, 0]]);
    }

    #[tokio::test]
    async fn connecting_elsewhere_closes_previous_link() {
        let adapter = Arc::new(MockAdapter::advertising(&["lamp-1", "lamp-2"]));
        let transport = scanned_transport(Arc::clone(&adapter)).await;

        transport.connect(&DeviceId::from("lamp-1")).await.unwrap();
        transport.connect(&DeviceId::from("lamp-2")).await.unwrap();

        assert!(adapter.session("lamp-1").closed_by_host.load(Ordering::SeqCst));
        let snap = transport.snapshot();
        assert_eq!(snap.connected.unwrap().id, DeviceId::from("lamp-2"));
        let lamp1 = snap
            .devices
            .iter()
            .find(|d| d.id == DeviceId::from("lamp-1"))
            .unwrap();
        assert_eq!(lamp1.state, DeviceState::Disconnected);
    }

    #[tokio::test]
    async fn failed_connect_restores_previous_state() {
        let adapter = Arc::new(MockAdapter::advertising(&["unreachable"]));
        let transport = scanned_transport(adapter).await;

        let err = transport
            .connect(&DeviceId::from("unreachable"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ConnectFailed(_)));

        let snap = transport.snapshot();
        assert!(snap.connected.is_none());
        assert_eq!(snap.devices[0].state, DeviceState::Discovered);
    }

    #[tokio::test]
    async fn link_loss_forces_idle_and_is_distinct() {
        let (tx, mut rx) = mpsc::channel(16);
        let adapter = Arc::new(MockAdapter::advertising(&["lamp-1"]));
        let transport =
            ShortRangeTransport::new(adapter.clone() as Arc<dyn LinkAdapter>).with_events(tx);
        transport
            .start_scan(Duration::from_millis(200))
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        transport.connect(&DeviceId::from("lamp-1")).await.unwrap();

        adapter.session("lamp-1").lost.notify_one();
        sleep(Duration::from_millis(50)).await;

        let snap = transport.snapshot();
        assert!(snap.connected.is_none());

        let mut saw_link_loss = false;
        while let Ok(Some(event)) = timeout(Duration::from_millis(100), rx.recv()).await {
            if let TransportEvent::Disconnected { id, link_lost } = event {
                if id == DeviceId::from("lamp-1") && link_lost {
                    saw_link_loss = true;
                    break;
                }
            }
        }
        assert!(saw_link_loss);
    }

    #[tokio::test]
    async fn send_failure_leaves_connection_up() {
        let adapter = Arc::new(MockAdapter::advertising(&["lamp-1"]));
        let transport = scanned_transport(Arc::clone(&adapter)).await;
        transport.connect(&DeviceId::from("lamp-1")).await.unwrap();

        adapter
            .session("lamp-1")
            .fail_writes
            .store(true, Ordering::SeqCst);
        let err = transport
            .send(&ColorPacket::Single(Rgb::BLACK))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SendFailed(_)));
        assert!(transport.snapshot().connected.is_some());
    }

    #[tokio::test]
    async fn rescan_while_connected_keeps_connection() {
        let adapter = Arc::new(MockAdapter::advertising(&["lamp-1", "lamp-2"]));
        let transport = scanned_transport(Arc::clone(&adapter)).await;
        transport.connect(&DeviceId::from("lamp-1")).await.unwrap();

        transport
            .start_scan(Duration::from_millis(200))
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;

        let snap = transport.snapshot();
        assert_eq!(snap.connected.unwrap().id, DeviceId::from("lamp-1"));
        // Rescan appended nothing new and duplicated nothing.
        assert_eq!(snap.devices.len(), 2);
    }
}
