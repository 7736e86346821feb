//! The `broker` module is the subscriber side of the event stream.
//!
//! It defines the event model delivered to consumers, the kind filters
//! consumers register with, and the registry that fans each decoded event out
//! to the matching subscriptions.

pub mod engine;
pub mod message;
pub mod topic;

pub use engine::{Registry, Subscription, SubscriptionInfo};
pub use message::{AlertTriggered, ChunkInfo, Event, EventKind, EventPayload, Notification};
pub use topic::{KindFilter, SubscriptionId};
