use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::utils::error::ClientError;

/// The event kinds this client understands.
///
/// Anything else the server sends is ignored so that newer servers can add
/// kinds without breaking older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewChunk,
    AlertTriggered,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::NewChunk, EventKind::AlertTriggered];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewChunk => "new_chunk",
            EventKind::AlertTriggered => "alert_triggered",
        }
    }

    /// Looks up a wire tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly recorded video segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// ISO-8601 creation time as sent by the server.
    pub created: String,
}

impl ChunkInfo {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created)
    }
}

/// A condition check that fired against a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTriggered {
    pub alert_id: String,
    pub video_id: String,
    pub video_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected: Option<bool>,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub summary: String,
    pub snapshot: String,
    pub video_path: String,
    /// Position inside the chunk, e.g. `"0:12 - 0:18"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_timestamp: Option<String>,
    pub timestamp: String,
}

impl AlertTriggered {
    pub fn confidence_percent(&self) -> f64 {
        self.confidence * 100.0
    }

    pub fn triggered_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    NewChunk(ChunkInfo),
    AlertTriggered(AlertTriggered),
}

/// An immutable, decoded server event.
///
/// Events are never persisted or replayed; a subscriber only sees what
/// arrives while it is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    payload: EventPayload,
    received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(payload: EventPayload, received_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            received_at,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::NewChunk(_) => EventKind::NewChunk,
            EventPayload::AlertTriggered(_) => EventKind::AlertTriggered,
        }
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn as_chunk(&self) -> Option<&ChunkInfo> {
        match &self.payload {
            EventPayload::NewChunk(chunk) => Some(chunk),
            _ => None,
        }
    }

    pub fn as_alert(&self) -> Option<&AlertTriggered> {
        match &self.payload {
            EventPayload::AlertTriggered(alert) => Some(alert),
            _ => None,
        }
    }

    /// Content-derived key for consumer-side deduplication.
    ///
    /// The server may re-send an occurrence across a reconnect, so consumers
    /// that must act once per occurrence key on this rather than on arrival.
    pub fn identity(&self) -> String {
        match &self.payload {
            EventPayload::NewChunk(chunk) => format!("{}:{}", self.kind(), chunk.filename),
            EventPayload::AlertTriggered(alert) => {
                format!("{}:{}@{}", self.kind(), alert.alert_id, alert.timestamp)
            }
        }
    }
}

/// What a subscription receives.
#[derive(Debug, Clone)]
pub enum Notification {
    Event(Arc<Event>),
    Error(Arc<ClientError>),
}

impl Notification {
    pub fn event(&self) -> Option<&Event> {
        match self {
            Notification::Event(event) => Some(event.as_ref()),
            Notification::Error(_) => None,
        }
    }
}

/// The backend writes naive local timestamps (`2024-01-01T12:00:00.123456`),
/// other producers write RFC 3339. Naive values are taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
