use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::message::{AlertTriggered, ChunkInfo, Event, EventKind, EventPayload};
use crate::utils::error::DecodeError;

/// Text payload the client sends as its keepalive.
pub const KEEPALIVE_PAYLOAD: &str = "ping";

/// Text payload some servers answer a keepalive with.
pub const KEEPALIVE_REPLY: &str = "pong";

/// The `{ "type": ..., "data": ... }` envelope every server frame uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl ServerFrame {
    pub fn new_chunk(chunk: &ChunkInfo) -> Self {
        Self::encode(EventKind::NewChunk, chunk)
    }

    pub fn alert_triggered(alert: &AlertTriggered) -> Self {
        Self::encode(EventKind::AlertTriggered, alert)
    }

    fn encode<T: Serialize>(kind: EventKind, data: &T) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn to_text(&self) -> String {
        // A struct of a String and a Value always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Decodes one text frame.
///
/// - `Ok(Some(event))` for a recognised kind with a well-formed payload
/// - `Ok(None)` for kinds this client does not know and for keepalive replies
/// - `Err(_)` when the frame is not an envelope or a known payload is malformed
pub fn decode_frame(text: &str, received_at: DateTime<Utc>) -> Result<Option<Event>, DecodeError> {
    if text.trim() == KEEPALIVE_REPLY {
        return Ok(None);
    }

    let frame: ServerFrame = serde_json::from_str(text)?;
    let Some(kind) = EventKind::from_tag(&frame.kind) else {
        return Ok(None);
    };

    let payload = match kind {
        EventKind::NewChunk => EventPayload::NewChunk(payload(kind, frame.data)?),
        EventKind::AlertTriggered => EventPayload::AlertTriggered(payload(kind, frame.data)?),
    };

    Ok(Some(Event::new(payload, received_at)))
}

/// Binary frames carry the same JSON as text frames.
pub fn decode_binary(
    data: &[u8],
    received_at: DateTime<Utc>,
) -> Result<Option<Event>, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|_| DecodeError::NotUtf8)?;
    decode_frame(text, received_at)
}

fn payload<T: serde::de::DeserializeOwned>(kind: EventKind, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        kind: kind.as_str(),
        source,
    })
}

/// Shortens a frame for log output.
pub(crate) fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
