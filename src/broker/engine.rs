//! Subscriber registry
//!
//! The registry owns every live subscription of one connection and fans
//! decoded events out to them. Responsibilities:
//! - keep subscriptions in registration order (ids are handed out monotonically)
//! - route each event only to subscriptions whose kind filter matches
//! - push into a per-subscription queue so a slow consumer never holds up the
//!   connection or the subscriptions behind it
//! - forget subscriptions whose consumer has gone away
//!
//! The registry is plain synchronous state owned by the connection task; it
//! never blocks and never awaits.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::broker::message::{Event, EventKind, Notification};
use crate::broker::topic::{KindFilter, SubscriptionId};
use crate::utils::error::ClientError;

/// One consumer's registration.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub kinds: KindFilter,
    sender: UnboundedSender<Notification>,
    delivered: u64,
}

impl Subscription {
    pub fn new(id: SubscriptionId, kinds: KindFilter, sender: UnboundedSender<Notification>) -> Self {
        Self {
            id,
            kinds,
            sender,
            delivered: 0,
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn notify(&mut self, notification: Notification) -> bool {
        self.sender.send(notification).is_ok()
    }
}

/// Read-only view of a subscription, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub kinds: Vec<EventKind>,
    pub delivered: u64,
}

#[derive(Debug, Default)]
pub struct Registry {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription. Re-using an id replaces the previous registration.
    pub fn attach(&mut self, subscription: Subscription) {
        debug!(
            subscription = subscription.id,
            kinds = ?subscription.kinds,
            "subscription attached"
        );
        self.subscriptions.insert(subscription.id, subscription);
    }

    /// Removes a subscription. Returns `false` when it was already gone.
    pub fn detach(&mut self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(&id).is_some();
        if removed {
            debug!(subscription = id, "subscription detached");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    /// Delivers `event` to every matching subscription in registration order.
    ///
    /// Returns the number of subscriptions that accepted it. Subscriptions
    /// whose receiving side is gone are dropped on the way.
    pub fn dispatch(&mut self, event: Arc<Event>) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        let mut gone = Vec::new();

        for (id, subscription) in self.subscriptions.iter_mut() {
            if !subscription.kinds.matches(kind) {
                continue;
            }
            if subscription.notify(Notification::Event(event.clone())) {
                subscription.delivered += 1;
                delivered += 1;
            } else {
                gone.push(*id);
            }
        }

        for id in gone {
            self.subscriptions.remove(&id);
            debug!(subscription = id, "subscriber went away; removed");
        }

        trace!(%kind, delivered, "event dispatched");
        delivered
    }

    /// Sends a terminal error to every subscription regardless of filter.
    pub fn broadcast_error(&mut self, error: Arc<ClientError>) {
        for subscription in self.subscriptions.values_mut() {
            subscription.notify(Notification::Error(error.clone()));
        }
        self.prune_closed();
    }

    /// Sends a terminal error to one subscription.
    pub fn notify_error(&mut self, id: SubscriptionId, error: Arc<ClientError>) {
        if let Some(subscription) = self.subscriptions.get_mut(&id) {
            subscription.notify(Notification::Error(error));
        }
    }

    /// Drops subscriptions whose consumer has gone away. Returns how many.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, subscription| !subscription.is_closed());
        before - self.subscriptions.len()
    }

    pub fn snapshot(&self) -> Vec<SubscriptionInfo> {
        self.subscriptions
            .values()
            .map(|subscription| SubscriptionInfo {
                id: subscription.id,
                kinds: subscription.kinds.kinds().collect(),
                delivered: subscription.delivered,
            })
            .collect()
    }
}
