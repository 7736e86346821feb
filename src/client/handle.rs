use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::broker::engine::{Subscription, SubscriptionInfo};
use crate::broker::message::Notification;
use crate::broker::topic::{KindFilter, SubscriptionId};
use crate::client::subscription::{Binding, Subscriber, SubscriptionHandle, spawn_delivery};
use crate::config::Settings;
use crate::connection::manager::{Command, ConnectionManager};
use crate::connection::options::ClientOptions;
use crate::connection::state::{ConnectionState, ConnectionStatus};
use crate::transport::endpoint::resolve_url;
use crate::transport::websocket::{Connector, WebSocketConnector};

/// Handle to the shared connection for one endpoint.
///
/// Cheap to clone; every clone talks to the same connection task. The task
/// is spawned on construction, so this must be called inside a Tokio
/// runtime. It stays idle until the first subscription and stops once every
/// clone, every [`SubscriptionHandle`] and every forgotten subscription is
/// gone, or on [`shutdown`].
///
/// Each call to [`new`] opens its own connection, even for an endpoint that
/// already has one. Use [`EventHub::client`] to share one connection per
/// endpoint across independent parts of an application.
///
/// [`shutdown`]: EventClient::shutdown
/// [`new`]: EventClient::new
/// [`EventHub::client`]: crate::client::EventHub::client
#[derive(Clone)]
pub struct EventClient {
    shared: Arc<Shared>,
}

struct Shared {
    endpoint: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    next_id: AtomicU64,
}

impl EventClient {
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Self {
        Self::with_connector(endpoint, options, Arc::new(WebSocketConnector))
    }

    /// Endpoint and tuning from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            resolve_url(&settings.endpoint),
            ClientOptions::from_settings(settings),
        )
    }

    pub fn with_connector(
        endpoint: impl Into<String>,
        options: ClientOptions,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let endpoint = endpoint.into();
        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);

        let manager = ConnectionManager::new(endpoint.clone(), connector, options, rx, state_tx);
        tokio::spawn(manager.run());
        debug!(%endpoint, "event client created");

        Self {
            shared: Arc::new(Shared {
                endpoint,
                commands,
                state,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Registers a callback for the given kinds.
    ///
    /// The first subscription opens the connection. Events already
    /// received are not replayed.
    pub fn subscribe<F>(&self, kinds: impl Into<KindFilter>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.bind(kinds.into(), Binding::Callback(Box::new(callback)))
    }

    /// Registers a [`Subscriber`] and keeps it alive until detached.
    pub fn subscribe_with<S: Subscriber>(
        &self,
        kinds: impl Into<KindFilter>,
        subscriber: Arc<S>,
    ) -> SubscriptionHandle {
        self.bind(kinds.into(), Binding::Strong(subscriber))
    }

    /// Registers a [`Subscriber`] without keeping it alive. Once the caller
    /// drops its last `Arc`, deliveries stop and the subscription detaches
    /// within a second, whether or not matching events arrive.
    pub fn subscribe_weak<S: Subscriber>(
        &self,
        kinds: impl Into<KindFilter>,
        subscriber: &Arc<S>,
    ) -> SubscriptionHandle {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        let weak: Weak<dyn Subscriber> = weak;
        self.bind(kinds.into(), Binding::Weak(weak))
    }

    /// Raw access to a subscription's queue, for consumers that want to
    /// drive delivery themselves. Dropping the receiver detaches as well.
    pub fn subscribe_channel(
        &self,
        kinds: impl Into<KindFilter>,
    ) -> (SubscriptionHandle, mpsc::UnboundedReceiver<Notification>) {
        self.attach(kinds.into())
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        handle.detach();
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().status()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.clone()
    }

    /// Leaves `Offline`, or cuts a pending backoff short.
    pub fn reconnect(&self) {
        let _ = self.shared.commands.send(Command::Retry);
    }

    /// Current subscriptions, in registration order.
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let (reply, answer) = oneshot::channel();
        if self.shared.commands.send(Command::Inspect { reply }).is_err() {
            return Vec::new();
        }
        answer.await.unwrap_or_default()
    }

    /// Closes the connection and stops the connection task. Subscriptions
    /// made afterwards are never served.
    pub fn shutdown(&self) {
        let _ = self.shared.commands.send(Command::Shutdown);
    }

    fn bind(&self, kinds: KindFilter, binding: Binding) -> SubscriptionHandle {
        let (handle, queue) = self.attach(kinds);
        spawn_delivery(handle.id(), queue, binding, self.shared.commands.clone());
        handle
    }

    fn attach(
        &self,
        kinds: KindFilter,
    ) -> (SubscriptionHandle, mpsc::UnboundedReceiver<Notification>) {
        let id: SubscriptionId = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, queue) = mpsc::unbounded_channel();
        let _ = self.shared.commands.send(Command::Attach {
            subscription: Subscription::new(id, kinds, sender),
        });
        (SubscriptionHandle::new(id, self.shared.commands.clone()), queue)
    }
}

impl std::fmt::Debug for EventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClient")
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
