//! Connection manager
//!
//! One task per endpoint owns the transport, the subscriber registry and
//! every timer. It runs the state machine below and is driven by commands
//! from `EventClient` handles:
//!
//! - `Idle`: no transport, waits for the first subscriber
//! - `Connecting`: one connect attempt, bounded by the connect timeout
//! - `Open`: reads frames, dispatches events, sends keepalives, watches for silence
//! - `Reconnecting`: waits out the backoff delay
//! - `Closing`: the last subscriber left; the transport is closed, nothing is rescheduled
//! - `Offline`: a terminal error was reported; waits for an explicit retry
//!
//! Every timer lives inside the state that needs it, so leaving a state
//! cancels its timers. Nothing outlives the last detach.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, info, trace, warn};
use tungstenite::Error as WsError;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::engine::{Registry, Subscription, SubscriptionInfo};
use crate::broker::topic::SubscriptionId;
use crate::connection::liveness::{KeepaliveOptions, Liveness};
use crate::connection::options::ClientOptions;
use crate::connection::state::ConnectionState;
use crate::transport::message::{KEEPALIVE_PAYLOAD, decode_binary, decode_frame, preview};
use crate::transport::websocket::{BoxTransport, Connector};
use crate::utils::error::{ClientError, ConnectError, DecodeError};

/// Requests from client handles to the connection task.
pub(crate) enum Command {
    Attach { subscription: Subscription },
    Detach { id: SubscriptionId },
    Retry,
    Inspect { reply: oneshot::Sender<Vec<SubscriptionInfo>> },
    Shutdown,
}

enum Phase {
    Idle,
    Connecting,
    Open(BoxTransport),
    Reconnecting(Duration),
    Offline,
    Stopped,
}

/// What a command means for the current state.
enum Control {
    Continue,
    /// The last subscriber detached.
    Drained,
    Retry,
    Stop,
}

pub(crate) struct ConnectionManager {
    endpoint: String,
    connector: Arc<dyn Connector>,
    options: ClientOptions,
    registry: Registry,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    attempts: u32,
    terminal: Option<Arc<ClientError>>,
}

impl ConnectionManager {
    pub(crate) fn new(
        endpoint: String,
        connector: Arc<dyn Connector>,
        options: ClientOptions,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            endpoint,
            connector,
            options,
            registry: Registry::new(),
            commands,
            state,
            attempts: 0,
            terminal: None,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connecting => self.connecting().await,
                Phase::Open(transport) => self.open(transport).await,
                Phase::Reconnecting(delay) => self.reconnecting(delay).await,
                Phase::Offline => self.offline().await,
                Phase::Stopped => break,
            };
        }
        self.set_state(ConnectionState::Idle);
        debug!(endpoint = %self.endpoint, "connection manager stopped");
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(endpoint = %self.endpoint, from = %previous, to = %next, "connection state changed");
        }
    }

    fn apply(&mut self, command: Option<Command>) -> Control {
        match command {
            Some(Command::Attach { subscription }) => {
                let id = subscription.id;
                self.registry.attach(subscription);
                if let Some(error) = &self.terminal {
                    self.registry.notify_error(id, error.clone());
                }
                Control::Continue
            }
            Some(Command::Detach { id }) => {
                if self.registry.detach(id) && self.registry.is_empty() {
                    Control::Drained
                } else {
                    Control::Continue
                }
            }
            Some(Command::Retry) => Control::Retry,
            Some(Command::Inspect { reply }) => {
                let _ = reply.send(self.registry.snapshot());
                Control::Continue
            }
            Some(Command::Shutdown) | None => Control::Stop,
        }
    }

    async fn idle(&mut self) -> Phase {
        self.set_state(ConnectionState::Idle);
        self.attempts = 0;

        loop {
            let command = self.commands.recv().await;
            match self.apply(command) {
                Control::Stop => return Phase::Stopped,
                _ if !self.registry.is_empty() => return Phase::Connecting,
                _ => {}
            }
        }
    }

    async fn connecting(&mut self) -> Phase {
        self.set_state(ConnectionState::Connecting);
        debug!(endpoint = %self.endpoint, attempt = self.attempts + 1, "connecting");

        let attempt = timeout(
            self.options.connect_timeout,
            self.connector.connect(&self.endpoint),
        );
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match self.apply(command) {
                    Control::Drained => return self.close(None).await,
                    Control::Stop => return Phase::Stopped,
                    Control::Continue | Control::Retry => {}
                },

                result = &mut attempt => {
                    return match result {
                        Ok(Ok(transport)) => Phase::Open(transport),
                        Ok(Err(ConnectError::Terminal(error))) => self.go_offline(error),
                        Ok(Err(ConnectError::Transient(reason))) => self.schedule_reconnect(&reason),
                        Err(_) => {
                            let reason = format!(
                                "no handshake within {:?}",
                                self.options.connect_timeout
                            );
                            self.schedule_reconnect(&reason)
                        }
                    };
                }
            }
        }
    }

    async fn open(&mut self, mut transport: BoxTransport) -> Phase {
        self.attempts = 0;
        self.set_state(ConnectionState::Open);

        let keepalive = self.options.keepalive.clone();
        let mut liveness = Liveness::start(&keepalive, Instant::now());

        loop {
            let ping_at = liveness.next_ping();
            let dead_at = liveness.deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match self.apply(command) {
                    Control::Drained => return self.close(Some(transport)).await,
                    Control::Stop => {
                        self.close(Some(transport)).await;
                        return Phase::Stopped;
                    }
                    Control::Continue | Control::Retry => {}
                },

                frame = transport.next() => {
                    liveness.record_activity(Instant::now());
                    match frame {
                        Some(Ok(message)) => {
                            if let Some(reason) = self.on_message(message) {
                                return self.schedule_reconnect(&reason);
                            }
                            if self.registry.is_empty() {
                                return self.close(Some(transport)).await;
                            }
                        }
                        Some(Err(e)) => return self.schedule_reconnect(&e.to_string()),
                        None => return self.schedule_reconnect("stream ended"),
                    }
                }

                _ = sleep_until(dead_at) => {
                    let silent_for = Instant::now().saturating_duration_since(liveness.last_activity());
                    warn!(
                        endpoint = %self.endpoint,
                        ?silent_for,
                        "no traffic within the keepalive timeout; treating connection as dead"
                    );
                    return self.schedule_reconnect("keepalive timeout");
                }

                _ = sleep_until(ping_at) => {
                    if let Err(e) = send_keepalive(&mut transport, &keepalive).await {
                        return self.schedule_reconnect(&format!("keepalive failed: {e}"));
                    }
                    trace!(endpoint = %self.endpoint, "keepalive sent");
                    liveness.record_ping(Instant::now());
                }
            }
        }
    }

    async fn reconnecting(&mut self, delay: Duration) -> Phase {
        let wait = sleep(delay);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match self.apply(command) {
                    Control::Drained => return self.close(None).await,
                    Control::Stop => return Phase::Stopped,
                    Control::Retry => return Phase::Connecting,
                    Control::Continue => {}
                },

                _ = &mut wait => {
                    self.registry.prune_closed();
                    return if self.registry.is_empty() {
                        Phase::Idle
                    } else {
                        Phase::Connecting
                    };
                }
            }
        }
    }

    async fn offline(&mut self) -> Phase {
        loop {
            let command = self.commands.recv().await;
            match self.apply(command) {
                Control::Drained => {
                    self.terminal = None;
                    return Phase::Idle;
                }
                Control::Retry => {
                    info!(endpoint = %self.endpoint, "retry requested while offline");
                    self.terminal = None;
                    self.attempts = 0;
                    self.registry.prune_closed();
                    return if self.registry.is_empty() {
                        Phase::Idle
                    } else {
                        Phase::Connecting
                    };
                }
                Control::Stop => return Phase::Stopped,
                Control::Continue => {}
            }
        }
    }

    async fn close(&mut self, transport: Option<BoxTransport>) -> Phase {
        self.set_state(ConnectionState::Closing);

        if let Some(mut transport) = transport {
            match timeout(self.options.close_timeout, transport.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(endpoint = %self.endpoint, error = %e, "close handshake failed"),
                Err(_) => debug!(endpoint = %self.endpoint, "close handshake timed out"),
            }
        }

        info!(endpoint = %self.endpoint, "no subscribers left; connection closed");
        Phase::Idle
    }

    fn go_offline(&mut self, error: ClientError) -> Phase {
        warn!(endpoint = %self.endpoint, %error, "giving up on connection");
        let error = Arc::new(error);
        self.registry.broadcast_error(error.clone());
        self.terminal = Some(error);
        self.set_state(ConnectionState::Offline);
        Phase::Offline
    }

    fn schedule_reconnect(&mut self, reason: &str) -> Phase {
        self.registry.prune_closed();
        if self.registry.is_empty() {
            debug!(endpoint = %self.endpoint, reason, "connection lost with no subscribers left");
            return Phase::Idle;
        }

        match self.options.reconnect.delay_for(self.attempts) {
            Some(delay) => {
                self.attempts += 1;
                warn!(
                    endpoint = %self.endpoint,
                    reason,
                    attempt = self.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "connection lost; reconnecting"
                );
                self.set_state(ConnectionState::Reconnecting);
                Phase::Reconnecting(delay)
            }
            None => self.go_offline(ClientError::RetriesExhausted {
                attempts: self.attempts,
            }),
        }
    }

    /// Handles one inbound message. Returns a reason when the server closed
    /// the connection.
    fn on_message(&mut self, message: WsMessage) -> Option<String> {
        let received_at = Utc::now();
        let decoded: Result<_, (DecodeError, String)> = match message {
            WsMessage::Text(text) => decode_frame(text.as_str(), received_at)
                .map_err(|e| (e, preview(text.as_str()))),
            WsMessage::Binary(data) => decode_binary(&data, received_at)
                .map_err(|e| (e, format!("<{} binary bytes>", data.len()))),
            WsMessage::Close(frame) => {
                return Some(match frame {
                    Some(frame) => format!(
                        "server closed the connection ({}: {})",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "server closed the connection".to_string(),
                });
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => return None,
        };

        match decoded {
            Ok(Some(event)) => {
                let kind = event.kind();
                let delivered = self.registry.dispatch(Arc::new(event));
                debug!(endpoint = %self.endpoint, %kind, delivered, "event received");
            }
            Ok(None) => trace!(endpoint = %self.endpoint, "ignoring frame of unknown kind"),
            Err((error, frame)) => {
                warn!(endpoint = %self.endpoint, %error, frame, "dropping undecodable frame")
            }
        }
        None
    }
}

async fn send_keepalive(
    transport: &mut BoxTransport,
    keepalive: &KeepaliveOptions,
) -> Result<(), WsError> {
    transport
        .feed(WsMessage::text(KEEPALIVE_PAYLOAD.to_string()))
        .await?;
    if keepalive.protocol_ping {
        transport.feed(WsMessage::Ping(Default::default())).await?;
    }
    transport.flush().await
}
