//! # vigil
//!
//! `vigil` is a resilient client for a server's real-time event stream. Many
//! independent consumers share one WebSocket connection per endpoint; the
//! connection is opened by the first subscription, kept alive, transparently
//! re-established after failures, and closed when the last consumer leaves.
//!
//! ## Core Modules
//!
//! - `broker`: Event model and the registry that routes events to subscriptions by kind.
//! - `client`: Consumer-facing handles (`EventClient`, `EventHub`, `SubscriptionHandle`).
//! - `config`: Layered configuration from file and environment variables.
//! - `connection`: The connection state machine, reconnect backoff and keepalive.
//! - `transport`: Frame decoding, endpoint resolution, the WebSocket connector and a demo server.
//! - `utils`: Error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod connection;
pub mod transport;
pub mod utils;

pub use broker::{AlertTriggered, ChunkInfo, Event, EventKind, EventPayload, KindFilter, Notification};
pub use client::{DedupFilter, EventClient, EventHub, Subscriber, SubscriptionHandle};
pub use connection::{ClientOptions, ConnectionState, ConnectionStatus};
pub use utils::ClientError;

#[cfg(test)]
mod tests;
