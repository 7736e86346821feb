//! End-to-end runs against the demo event server over real sockets.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use crate::broker::message::{AlertTriggered, ChunkInfo, EventKind, Notification};
use crate::broker::topic::KindFilter;
use crate::client::EventClient;
use crate::connection::{ClientOptions, ConnectionState, KeepaliveOptions, ReconnectPolicy};
use crate::transport::{EventServer, ServerFrame};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (EventServer, String) {
    let port = portpicker::pick_unused_port().expect("free port");
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let server = EventServer::new();
    tokio::spawn(server.clone().serve(listener));
    (server, format!("ws://127.0.0.1:{port}/ws/chunks"))
}

fn fast_options() -> ClientOptions {
    ClientOptions {
        reconnect: ReconnectPolicy::fixed(Duration::from_millis(100)),
        keepalive: KeepaliveOptions {
            interval: Duration::from_millis(100),
            timeout_multiplier: 10,
            protocol_ping: true,
        },
        connect_timeout: Duration::from_secs(2),
        close_timeout: Duration::from_millis(500),
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let result = timeout(WAIT, async {
        while !check() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

async fn wait_for(client: &EventClient, target: ConnectionState) {
    timeout(WAIT, client.watch_state().wait_for(|state| *state == target))
        .await
        .expect("state change in time")
        .expect("connection task alive");
}

fn chunk(filename: &str) -> ChunkInfo {
    ChunkInfo {
        filename: filename.to_string(),
        size: 1_048_576,
        created: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn integration_events_reach_every_subscriber_over_one_socket() {
    let (server, url) = start_server().await;
    let client = EventClient::new(url, fast_options());

    let (_all, mut all_rx) = client.subscribe_channel(KindFilter::all());
    let (_chunks, mut chunk_rx) = client.subscribe_channel(EventKind::NewChunk);
    let (_alerts, mut alert_rx) = client.subscribe_channel(EventKind::AlertTriggered);

    wait_for(&client, ConnectionState::Open).await;
    eventually("server to register the client", || server.connection_count() == 1).await;

    server.broadcast(&ServerFrame::new_chunk(&chunk("c1.mp4")));
    let alert: AlertTriggered = serde_json::from_value(serde_json::json!({
        "alert_id": "a1",
        "video_id": "v1",
        "video_name": "v1.mp4",
        "description": "person at the door",
        "confidence": 0.875,
        "snapshot": "/snapshots/a1.jpg",
        "video_path": "/videos/v1.mp4",
        "timestamp": "2024-01-01T00:00:05Z"
    }))
    .unwrap();
    server.broadcast(&ServerFrame::alert_triggered(&alert));

    let first = timeout(WAIT, all_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.event().unwrap().kind(), EventKind::NewChunk);
    let second = timeout(WAIT, all_rx.recv()).await.unwrap().unwrap();
    assert_eq!(second.event().unwrap().kind(), EventKind::AlertTriggered);

    let chunk_event = timeout(WAIT, chunk_rx.recv()).await.unwrap().unwrap();
    assert_eq!(chunk_event.event().unwrap().as_chunk().unwrap().size_mb(), 1.0);

    let alert_event = timeout(WAIT, alert_rx.recv()).await.unwrap().unwrap();
    let received = alert_event.event().unwrap().as_alert().unwrap().clone();
    assert_eq!(received.alert_id, "a1");
    assert_eq!(received.confidence_percent(), 87.5);

    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn integration_client_reconnects_after_server_drop() {
    let (server, url) = start_server().await;
    let client = EventClient::new(url, fast_options());
    let (_handle, mut rx) = client.subscribe_channel(KindFilter::all());

    wait_for(&client, ConnectionState::Open).await;
    eventually("first connection", || server.connection_count() == 1).await;

    let mut states = client.watch_state();
    server.disconnect_all();
    timeout(WAIT, states.wait_for(|state| *state == ConnectionState::Reconnecting))
        .await
        .unwrap()
        .unwrap();

    wait_for(&client, ConnectionState::Open).await;
    eventually("second connection", || server.connection_count() == 1).await;

    server.broadcast(&ServerFrame::new_chunk(&chunk("after.mp4")));
    let notification = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    match notification {
        Notification::Event(event) => {
            assert_eq!(event.as_chunk().unwrap().filename, "after.mp4")
        }
        Notification::Error(error) => panic!("unexpected error: {error}"),
    }
}

#[tokio::test]
async fn integration_keepalives_reach_server() {
    let (server, url) = start_server().await;
    let client = EventClient::new(url, fast_options());
    let _handle = client.subscribe(KindFilter::all(), |_| {});

    wait_for(&client, ConnectionState::Open).await;
    eventually("keepalives", || server.keepalives_received() >= 2).await;
    assert_eq!(client.state(), ConnectionState::Open);
}

#[tokio::test]
async fn integration_last_unsubscribe_closes_socket() {
    let (server, url) = start_server().await;
    let client = EventClient::new(url, fast_options());
    let handle = client.subscribe(KindFilter::all(), |_| {});

    wait_for(&client, ConnectionState::Open).await;
    eventually("connection", || server.connection_count() == 1).await;

    client.unsubscribe(handle);
    wait_for(&client, ConnectionState::Idle).await;
    eventually("server to see the close", || server.connection_count() == 0).await;
}

#[tokio::test]
async fn integration_unreachable_server_keeps_retrying() {
    let port = portpicker::pick_unused_port().expect("free port");
    let client = EventClient::new(format!("ws://127.0.0.1:{port}/ws/chunks"), fast_options());
    let (_handle, mut rx) = client.subscribe_channel(KindFilter::all());

    wait_for(&client, ConnectionState::Reconnecting).await;
    sleep(Duration::from_millis(350)).await;
    assert_ne!(client.state(), ConnectionState::Offline);
    assert!(rx.try_recv().is_err());
}
