//! Connection lifecycle: state, reconnect backoff, keepalive and the task
//! that ties them together.

pub mod backoff;
pub mod liveness;
pub(crate) mod manager;
pub mod options;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use liveness::{KeepaliveOptions, Liveness};
pub use options::ClientOptions;
pub use state::{ConnectionState, ConnectionStatus};
