use super::endpoint::{normalize, parse_endpoint, resolve_host, resolve_url};
use super::message::{ServerFrame, decode_binary, decode_frame};
use super::websocket::{Connector, WebSocketConnector};
use crate::broker::message::{ChunkInfo, EventKind, EventPayload};
use crate::config::Settings;
use crate::utils::error::{ClientError, ConnectError, DecodeError};
use chrono::Utc;
use serde_json::json;

const NEW_CHUNK: &str = r#"{"type":"new_chunk","data":{"filename":"c1.mp4","size":1048576,"created":"2024-01-01T00:00:00Z"}}"#;

#[test]
fn test_decode_new_chunk() {
    let received_at = Utc::now();
    let event = decode_frame(NEW_CHUNK, received_at)
        .expect("decodes")
        .expect("known kind");

    assert_eq!(event.kind(), EventKind::NewChunk);
    assert_eq!(event.received_at(), received_at);
    let chunk = event.as_chunk().unwrap();
    assert_eq!(chunk.filename, "c1.mp4");
    assert_eq!(chunk.size, 1_048_576);
}

#[test]
fn test_decode_alert_triggered_as_sent_by_backend() {
    // Shape emitted by the detection backend, including the optional fields.
    let frame = json!({
        "type": "alert_triggered",
        "data": {
            "alert_id": "b1f6",
            "video_id": "garage",
            "video_name": "garage.mp4",
            "description": "car leaves the garage",
            "detected": true,
            "confidence": 0.92,
            "details": "A grey car exits.",
            "summary": "car exit",
            "snapshot": "/snapshots/b1f6.jpg",
            "video_path": "/chunks/chunk_0042.mp4",
            "video_timestamp": "0:12 - 0:18",
            "timestamp": "2024-05-01T08:30:00.123456"
        }
    })
    .to_string();

    let event = decode_frame(&frame, Utc::now()).unwrap().unwrap();
    let alert = event.as_alert().expect("alert payload");
    assert_eq!(alert.alert_id, "b1f6");
    assert_eq!(alert.detected, Some(true));
    assert_eq!(alert.video_timestamp.as_deref(), Some("0:12 - 0:18"));
    assert!(alert.triggered_at().is_some());
}

#[test]
fn test_decode_minimal_alert() {
    let frame = json!({
        "type": "alert_triggered",
        "data": {
            "alert_id": "a", "video_id": "v", "video_name": "v.mp4",
            "description": "d", "confidence": 0.5,
            "snapshot": "s.jpg", "video_path": "v.mp4",
            "timestamp": "2024-01-01T00:00:00Z"
        }
    })
    .to_string();

    let event = decode_frame(&frame, Utc::now()).unwrap().unwrap();
    let alert = event.as_alert().unwrap();
    assert_eq!(alert.detected, None);
    assert!(alert.details.is_empty());
}

#[test]
fn test_unknown_kind_is_ignored() {
    let frame = r#"{"type":"task_progress","data":{"percent":40}}"#;
    assert!(decode_frame(frame, Utc::now()).unwrap().is_none());
}

#[test]
fn test_keepalive_reply_is_ignored() {
    assert!(decode_frame("pong", Utc::now()).unwrap().is_none());
}

#[test]
fn test_malformed_frames_are_errors() {
    assert!(matches!(
        decode_frame("{not json", Utc::now()),
        Err(DecodeError::Malformed(_))
    ));
    assert!(matches!(
        decode_frame(r#"{"data":{}}"#, Utc::now()),
        Err(DecodeError::Malformed(_))
    ));

    let wrong_payload = r#"{"type":"new_chunk","data":{"filename":"c1.mp4","size":"big"}}"#;
    match decode_frame(wrong_payload, Utc::now()) {
        Err(DecodeError::Payload { kind, .. }) => assert_eq!(kind, "new_chunk"),
        other => panic!("expected a payload error, got {other:?}"),
    }
}

#[test]
fn test_decode_binary() {
    let event = decode_binary(NEW_CHUNK.as_bytes(), Utc::now()).unwrap().unwrap();
    assert_eq!(event.kind(), EventKind::NewChunk);

    assert!(matches!(
        decode_binary(&[0xff, 0xfe, 0x00], Utc::now()),
        Err(DecodeError::NotUtf8)
    ));
}

#[test]
fn test_server_frame_encodes_what_the_decoder_reads() {
    let chunk = ChunkInfo {
        filename: "chunk_7.mp4".to_string(),
        size: 2_097_152,
        created: "2024-01-01T00:00:07Z".to_string(),
    };
    let text = ServerFrame::new_chunk(&chunk).to_text();

    let event = decode_frame(&text, Utc::now()).unwrap().unwrap();
    assert_eq!(event.payload(), &EventPayload::NewChunk(chunk));
}

#[test]
fn test_resolve_url_from_settings() {
    let mut settings = Settings::default().endpoint;
    assert_eq!(resolve_url(&settings), "wss://localhost:8000/ws/chunks");

    settings.host = "127.0.0.1".to_string();
    assert_eq!(resolve_url(&settings), "wss://localhost:8000/ws/chunks");

    settings.host = "192.168.0.12".to_string();
    settings.secure = false;
    settings.path = "ws/chunks".to_string();
    assert_eq!(resolve_url(&settings), "ws://192.168.0.12:8000/ws/chunks");

    settings.url = Some(" ws://cams.local:9000/events ".to_string());
    assert_eq!(resolve_url(&settings), "ws://cams.local:9000/events");
}

#[test]
fn test_resolve_host() {
    assert_eq!(resolve_host("localhost"), "localhost");
    assert_eq!(resolve_host("127.0.0.1"), "localhost");
    assert_eq!(resolve_host("10.1.2.3"), "10.1.2.3");
}

#[test]
fn test_parse_endpoint() {
    let url = parse_endpoint("ws://localhost:8000/ws/chunks").unwrap();
    assert_eq!(url.scheme(), "ws");

    let url = parse_endpoint("https://backend.example:8000/ws/chunks").unwrap();
    assert_eq!(url.as_str(), "wss://backend.example:8000/ws/chunks");

    for bad in ["not a url", "ftp://backend/ws", "ws://"] {
        assert!(
            matches!(parse_endpoint(bad), Err(ClientError::InvalidEndpoint { .. })),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn test_normalize() {
    assert_eq!(
        normalize("http://LOCALHOST:8000/ws/chunks"),
        "ws://localhost:8000/ws/chunks"
    );
    assert_eq!(normalize(" garbage "), "garbage");
}

#[tokio::test]
async fn test_connector_reports_malformed_endpoint_as_terminal() {
    let result = WebSocketConnector.connect("definitely not a url").await;
    match result {
        Err(ConnectError::Terminal(ClientError::InvalidEndpoint { endpoint, .. })) => {
            assert_eq!(endpoint, "definitely not a url")
        }
        Err(other) => panic!("expected a terminal error, got {other}"),
        Ok(_) => panic!("expected a terminal error, got a transport"),
    }
}

#[tokio::test]
async fn test_connector_reports_refused_connection_as_transient() {
    let port = portpicker::pick_unused_port().expect("No free ports");
    let result = WebSocketConnector
        .connect(&format!("ws://127.0.0.1:{port}/ws/chunks"))
        .await;
    match result {
        Err(ConnectError::Transient(_)) => {}
        Err(other) => panic!("expected a transient error, got {other}"),
        Ok(_) => panic!("nothing should be listening on port {port}"),
    }
}
