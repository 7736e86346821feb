use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error};

use crate::broker::message::{Event, Notification};
use crate::broker::topic::SubscriptionId;
use crate::connection::manager::Command;
use crate::utils::error::ClientError;

/// A consumer of events, for callers that prefer a type over a closure.
///
/// Callbacks run on the subscription's own delivery task. They should return
/// quickly; a slow callback only delays its own subscription.
pub trait Subscriber: Send + Sync + 'static {
    fn on_event(&self, event: &Event);

    fn on_error(&self, error: &ClientError) {
        let _ = error;
    }
}

/// Keeps a subscription attached. Dropping it detaches.
#[derive(Debug)]
#[must_use = "dropping the handle detaches the subscription"]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    commands: UnboundedSender<Command>,
    attached: bool,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, commands: UnboundedSender<Command>) -> Self {
        Self {
            id,
            commands,
            attached: true,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn detach(mut self) {
        self.send_detach();
    }

    /// Leaves the subscription attached without a handle. It is served until
    /// its consumer goes away or the client is shut down, even after every
    /// `EventClient` clone is dropped. A weakly bound consumer still detaches
    /// once its owner drops it.
    ///
    /// A channel subscription has no delivery task to keep the connection
    /// alive; forgetting one only lasts while an `EventClient` clone does.
    pub fn forget(mut self) {
        self.attached = false;
    }

    fn send_detach(&mut self) {
        if std::mem::take(&mut self.attached) {
            let _ = self.commands.send(Command::Detach { id: self.id });
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.send_detach();
    }
}

/// How a delivery task reaches its consumer.
pub(crate) enum Binding {
    Callback(Box<dyn Fn(&Notification) + Send + Sync>),
    Strong(Arc<dyn Subscriber>),
    /// Does not keep the consumer alive.
    Weak(Weak<dyn Subscriber>),
}

/// How often a delivery task checks whether its weak consumer still exists.
const WEAK_CHECK_INTERVAL: Duration = Duration::from_secs(1);

impl Binding {
    fn is_weak(&self) -> bool {
        matches!(self, Binding::Weak(_))
    }

    fn is_alive(&self) -> bool {
        match self {
            Binding::Weak(subscriber) => subscriber.strong_count() > 0,
            Binding::Callback(_) | Binding::Strong(_) => true,
        }
    }

    /// Returns `false` once a weakly bound consumer is gone.
    fn deliver(&self, notification: &Notification) -> bool {
        match self {
            Binding::Callback(callback) => {
                callback(notification);
                true
            }
            Binding::Strong(subscriber) => {
                notify(subscriber.as_ref(), notification);
                true
            }
            Binding::Weak(subscriber) => match subscriber.upgrade() {
                Some(subscriber) => {
                    notify(subscriber.as_ref(), notification);
                    true
                }
                None => false,
            },
        }
    }
}

fn notify(subscriber: &dyn Subscriber, notification: &Notification) {
    match notification {
        Notification::Event(event) => subscriber.on_event(event),
        Notification::Error(error) => subscriber.on_error(error),
    }
}

/// Feeds one subscription's queue to its consumer, one notification at a time.
///
/// A panicking callback is logged and the next notification is delivered as
/// usual. The task holds a command sender, so the connection task keeps
/// serving the subscription for as long as the consumer exists. It ends when
/// the connection task drops the queue, or detaches the subscription itself
/// when a weak consumer disappears, whether or not events are flowing.
pub(crate) fn spawn_delivery(
    id: SubscriptionId,
    mut queue: UnboundedReceiver<Notification>,
    binding: Binding,
    commands: UnboundedSender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut weak_check = interval(WEAK_CHECK_INTERVAL);
        weak_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let notification = tokio::select! {
                notification = queue.recv() => match notification {
                    Some(notification) => notification,
                    None => return,
                },
                _ = weak_check.tick(), if binding.is_weak() => {
                    if binding.is_alive() {
                        continue;
                    }
                    break;
                }
            };

            match panic::catch_unwind(AssertUnwindSafe(|| binding.deliver(&notification))) {
                Ok(true) => {}
                Ok(false) => break,
                Err(_) => {
                    error!(subscription = id, "subscriber callback panicked; notification skipped")
                }
            }
        }

        debug!(subscription = id, "subscriber was dropped; detaching");
        let _ = commands.send(Command::Detach { id });
    })
}
