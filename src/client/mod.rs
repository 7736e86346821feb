//! The consumer-facing side: client handles, subscriptions and helpers.
//!
//! An [`EventClient`] owns nothing but a command channel into the connection
//! task. Each subscription gets its own queue and delivery task, so one
//! slow or panicking consumer never holds up another.

pub mod dedup;
pub mod handle;
pub mod hub;
pub mod subscription;

pub use dedup::DedupFilter;
pub use handle::EventClient;
pub use hub::EventHub;
pub use subscription::{Subscriber, SubscriptionHandle};
