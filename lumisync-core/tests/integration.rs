//! End-to-end transport tests over real localhost UDP sockets.
//!
//! A fake LED controller answers discovery probes and collects color
//! frames, exercising the full probe / announce / connect / send path
//! without hardware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

use lumisync_core::{
    ColorPacket, DISCOVERY_PROBE, DeviceId, DeviceState, Rgb, Transport, TransportEvent,
    UdpTransport,
};

const EVENT_WAIT: Duration = Duration::from_secs(5);

/// A fake controller: answers valid discovery probes with `announce`,
/// stays silent for anything else.
async fn spawn_responder(announce: String) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 256];
        while let Ok((len, src)) = socket.recv_from(&mut buf).await {
            if &buf[..len] == DISCOVERY_PROBE {
                let _ = socket.send_to(announce.as_bytes(), src).await;
            }
        }
    });
    addr
}

/// A fake color-frame listener; received datagrams go to the channel.
async fn spawn_color_sink() -> (SocketAddr, mpsc::Receiver<Vec<u8>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        while let Ok((len, _)) = socket.recv_from(&mut buf).await {
            if tx.send(buf[..len].to_vec()).await.is_err() {
                break;
            }
        }
    });
    (addr, rx)
}

fn transport_for(target: SocketAddr, events: mpsc::Sender<TransportEvent>) -> UdpTransport {
    UdpTransport::new()
        .with_events(events)
        // Listen port 0 binds an ephemeral scan socket; replies come
        // back to the probe's source address either way.
        .with_discovery_endpoint(target, 0)
        .with_probe_interval(Duration::from_millis(50))
}

async fn wait_for_found(rx: &mut mpsc::Receiver<TransportEvent>) -> DeviceId {
    loop {
        let event = timeout(EVENT_WAIT, rx.recv())
            .await
            .expect("timed out waiting for discovery")
            .expect("event channel closed");
        if let TransportEvent::DeviceFound(device) = event {
            return device.id;
        }
    }
}

#[tokio::test]
async fn scan_discovers_device_and_send_reaches_it() {
    let (color_addr, mut frames) = spawn_color_sink().await;
    let announce = format!(
        r#"{{"type":"ESP_LED_DEVICE","id":"esp-1","name":"Desk strip","port":{}}}"#,
        color_addr.port()
    );
    let responder = spawn_responder(announce).await;

    let (tx, mut rx) = mpsc::channel(32);
    let transport = transport_for(responder, tx);

    transport.start_scan(Duration::from_secs(3)).await.unwrap();
    let id = wait_for_found(&mut rx).await;
    assert_eq!(id, DeviceId::from("esp-1"));
    transport.stop_scan().await;

    transport.connect(&id).await.unwrap();
    transport
        .send(&ColorPacket::Single(Rgb::new(255, 0, 0)))
        .await
        .unwrap();

    let frame = timeout(EVENT_WAIT, frames.recv())
        .await
        .expect("timed out waiting for color frame")
        .unwrap();
    assert_eq!(frame, vec![0x00, 255, 0, 0]);

    let snap = transport.snapshot();
    assert_eq!(snap.connected.unwrap().id, id);
    assert!(!snap.scanning);
}

#[tokio::test]
async fn empty_scan_window_finishes_cleanly() {
    // A listener that never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = silent.local_addr().unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let transport = transport_for(target, tx);

    transport
        .start_scan(Duration::from_millis(300))
        .await
        .unwrap();

    let event = timeout(EVENT_WAIT, rx.recv()).await.unwrap().unwrap();
    assert!(matches!(
        event,
        TransportEvent::ScanFinished { devices: 0 }
    ));

    let snap = transport.snapshot();
    assert!(snap.devices.is_empty());
    assert!(!snap.scanning);
    drop(silent);
}

#[tokio::test]
async fn scan_restart_rebinds_the_discovery_port() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = silent.local_addr().unwrap();

    // Reserve a concrete port for the scan socket, then release it so
    // every restart has to bind the same one.
    let listen_port = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let transport = UdpTransport::new()
        .with_discovery_endpoint(target, listen_port)
        .with_probe_interval(Duration::from_millis(50));

    // Stop must release the port before returning.
    for _ in 0..5 {
        transport.start_scan(Duration::from_secs(2)).await.unwrap();
        transport.stop_scan().await;
        assert!(!transport.snapshot().scanning);
    }

    // A new scan supersedes a running one on the same port.
    transport.start_scan(Duration::from_secs(2)).await.unwrap();
    transport.start_scan(Duration::from_secs(2)).await.unwrap();
    assert!(transport.snapshot().scanning);
    transport.stop_scan().await;
}

#[tokio::test]
async fn sequential_scans_do_not_duplicate_devices() {
    let (color_addr, _frames) = spawn_color_sink().await;
    let announce = format!(
        r#"{{"type":"device-announce","id":"esp-2","port":{}}}"#,
        color_addr.port()
    );
    let responder = spawn_responder(announce).await;

    let (tx, mut rx) = mpsc::channel(32);
    let transport = transport_for(responder, tx);

    transport.start_scan(Duration::from_secs(3)).await.unwrap();
    wait_for_found(&mut rx).await;
    transport.stop_scan().await;

    // Second window rediscovers the same device.
    transport
        .start_scan(Duration::from_millis(300))
        .await
        .unwrap();
    loop {
        let event = timeout(EVENT_WAIT, rx.recv()).await.unwrap().unwrap();
        if matches!(event, TransportEvent::ScanFinished { .. }) {
            break;
        }
        // A second DeviceFound for esp-2 would be a dedupe failure.
        assert!(!matches!(event, TransportEvent::DeviceFound(_)));
    }

    assert_eq!(transport.snapshot().devices.len(), 1);
}

#[tokio::test]
async fn connecting_elsewhere_moves_the_single_connection() {
    let (color_a, mut frames_a) = spawn_color_sink().await;
    let announce = format!(
        r#"{{"type":"ESP_LED_DEVICE","id":"esp-a","port":{}}}"#,
        color_a.port()
    );
    let responder = spawn_responder(announce).await;

    let (color_b, mut frames_b) = spawn_color_sink().await;

    let (tx, mut rx) = mpsc::channel(32);
    let transport = transport_for(responder, tx);

    transport.start_scan(Duration::from_secs(3)).await.unwrap();
    let id_a = wait_for_found(&mut rx).await;
    transport.stop_scan().await;
    let id_b = transport.register("Saved strip", color_b);

    transport.connect(&id_a).await.unwrap();
    transport
        .send(&ColorPacket::Single(Rgb::new(255, 0, 0)))
        .await
        .unwrap();

    transport.connect(&id_b).await.unwrap();
    transport
        .send(&ColorPacket::Single(Rgb::new(0, 0, 255)))
        .await
        .unwrap();

    let frame_a = timeout(EVENT_WAIT, frames_a.recv()).await.unwrap().unwrap();
    let frame_b = timeout(EVENT_WAIT, frames_b.recv()).await.unwrap().unwrap();
    assert_eq!(frame_a, vec![0x00, 255, 0, 0]);
    assert_eq!(frame_b, vec![0x00, 0, 0, 255]);

    let snap = transport.snapshot();
    assert_eq!(snap.connected.unwrap().id, id_b);
    let a = snap.devices.iter().find(|d| d.id == id_a).unwrap();
    assert_eq!(a.state, DeviceState::Disconnected);
}

#[tokio::test]
async fn region_packet_arrives_byte_exact() {
    let (color_addr, mut frames) = spawn_color_sink().await;
    let transport = Arc::new(UdpTransport::new());
    let id = transport.register("Desk strip", color_addr);
    transport.connect(&id).await.unwrap();

    transport
        .send(&ColorPacket::Regions {
            top: Rgb::new(255, 0, 0),
            right: Rgb::new(0, 255, 0),
            bottom: Rgb::new(0, 0, 255),
            left: Rgb::new(255, 255, 255),
        })
        .await
        .unwrap();

    let frame = timeout(EVENT_WAIT, frames.recv()).await.unwrap().unwrap();
    assert_eq!(
        frame,
        vec![0x01, 255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]
    );
}
