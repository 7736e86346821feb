//! Scripted in-memory transport for exercising the connection manager
//! without sockets.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture};
use futures_util::{FutureExt, Sink, Stream};
use tokio::sync::mpsc;
use tungstenite::Error as WsError;
use tungstenite::protocol::Message as WsMessage;

use super::websocket::{BoxTransport, Connector};
use crate::utils::error::ConnectError;

/// The server end of one mock connection.
pub(crate) struct ServerLink {
    pub to_client: mpsc::UnboundedSender<Result<WsMessage, WsError>>,
    pub from_client: mpsc::UnboundedReceiver<WsMessage>,
}

impl ServerLink {
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(Ok(WsMessage::text(text.to_string())));
    }

    pub fn send(&self, message: WsMessage) {
        let _ = self.to_client.send(Ok(message));
    }

    pub fn fail(&self) {
        let _ = self.to_client.send(Err(WsError::ConnectionClosed));
    }

    /// Texts the client has written so far.
    pub fn drain_texts(&mut self) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(message) = self.from_client.try_recv() {
            if let WsMessage::Text(text) = message {
                texts.push(text.as_str().to_string());
            }
        }
        texts
    }
}

enum Plan {
    Fail(ConnectError),
    Hang,
}

pub(crate) struct MockConnector {
    links: mpsc::UnboundedSender<ServerLink>,
    plans: Mutex<VecDeque<Plan>>,
    attempts: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerLink>) {
        let (links, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            links,
            plans: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        });
        (connector, rx)
    }

    pub fn fail_next(&self, error: ConnectError) {
        self.plans.lock().unwrap().push_back(Plan::Fail(error));
    }

    /// The next attempt never completes.
    pub fn hang_next(&self) {
        self.plans.lock().unwrap().push_back(Plan::Hang);
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Transports currently held by the client.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, _endpoint: &str) -> BoxFuture<'static, Result<BoxTransport, ConnectError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        match self.plans.lock().unwrap().pop_front() {
            Some(Plan::Fail(error)) => return future::ready(Err(error)).boxed(),
            Some(Plan::Hang) => return future::pending().boxed(),
            None => {}
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        self.live.fetch_add(1, Ordering::SeqCst);
        let transport = MockTransport {
            incoming,
            outgoing,
            live: self.live.clone(),
        };
        let _ = self.links.send(ServerLink {
            to_client,
            from_client,
        });

        future::ready(Ok(Box::new(transport) as BoxTransport)).boxed()
    }
}

struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Result<WsMessage, WsError>>,
    outgoing: mpsc::UnboundedSender<WsMessage>,
    live: Arc<AtomicUsize>,
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Stream for MockTransport {
    type Item = Result<WsMessage, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_recv(cx)
    }
}

impl Sink<WsMessage> for MockTransport {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
        self.outgoing
            .send(item)
            .map_err(|_| WsError::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
