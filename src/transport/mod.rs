//! The `transport` module is responsible for the wire side of the event
//! stream.
//!
//! It decodes server frames into events, resolves and validates endpoints,
//! opens WebSocket transports for the connection manager, and provides a
//! small broadcast server speaking the same protocol.

pub mod endpoint;
pub mod message;
pub mod server;
pub mod websocket;

pub use message::{ServerFrame, decode_frame};
pub use server::{EventServer, start_event_server};
pub use websocket::{BoxTransport, Connector, FrameTransport, WebSocketConnector};

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;
