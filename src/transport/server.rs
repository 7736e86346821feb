//! Demo event server
//!
//! A minimal stand-in for the backend's `/ws/chunks` endpoint. It speaks the
//! same contract: accept WebSocket clients, read and ignore whatever they send
//! (keepalives), and broadcast `{type, data}` frames to everyone connected.
//! Used by `vigil serve` and by the end-to-end tests.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::transport::message::{KEEPALIVE_PAYLOAD, ServerFrame};

/// A connected client, as seen by the server.
#[derive(Debug)]
pub struct Peer {
    pub id: String,
    pub sender: UnboundedSender<WsMessage>,
}

impl Peer {
    /// Create a peer with a fresh UUID and the sending side of its outbound queue.
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventServer {
    peers: Arc<Mutex<HashMap<String, Peer>>>,
    keepalives: Arc<AtomicU64>,
}

impl EventServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<String, Peer>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn connection_count(&self) -> usize {
        self.peers().len()
    }

    pub fn keepalives_received(&self) -> u64 {
        self.keepalives.load(Ordering::SeqCst)
    }

    /// Sends `frame` to every connected peer. Returns how many accepted it.
    pub fn broadcast(&self, frame: &ServerFrame) -> usize {
        self.broadcast_text(&frame.to_text())
    }

    pub fn broadcast_text(&self, text: &str) -> usize {
        let message = WsMessage::text(text.to_string());
        let peers = self.peers();
        let mut sent = 0;
        for (id, peer) in peers.iter() {
            if let Err(e) = peer.sender.send(message.clone()) {
                warn!("Failed to queue frame for {id}: {e}");
            } else {
                sent += 1;
            }
        }
        sent
    }

    /// Closes every connection, as a restarting backend would.
    pub fn disconnect_all(&self) {
        for peer in self.peers().values() {
            let _ = peer.sender.send(WsMessage::Close(None));
        }
    }

    /// Accepts connections from `listener` until it fails.
    pub async fn serve(self, listener: TcpListener) {
        while let Ok((stream, remote)) = listener.accept().await {
            let server = self.clone();

            tokio::spawn(async move {
                let ws_stream = match accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        warn!("WebSocket handshake error from {remote}: {e}");
                        return;
                    }
                };

                let (mut ws_sender, mut ws_receiver) = ws_stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
                let peer = Peer::new(tx);
                let peer_id = peer.id.clone();
                server.peers().insert(peer_id.clone(), peer);
                info!("{peer_id} connected from {remote}");

                let send_loop = {
                    let peer_id = peer_id.clone();
                    spawn(async move {
                        while let Some(msg) = rx.recv().await {
                            let closing = msg.is_close();
                            if let Err(e) = ws_sender.send(msg).await {
                                debug!("Failed to send frame to {peer_id}: {e}");
                                break;
                            }
                            if closing {
                                break;
                            }
                        }
                        debug!("Send loop closed for {peer_id}");
                    })
                };

                while let Some(Ok(msg)) = ws_receiver.next().await {
                    match msg {
                        WsMessage::Text(text) if text.as_str() == KEEPALIVE_PAYLOAD => {
                            server.keepalives.fetch_add(1, Ordering::SeqCst);
                        }
                        WsMessage::Close(_) => break,
                        other => debug!("Ignoring frame from {peer_id}: {other:?}"),
                    }
                    if send_loop.is_finished() {
                        break;
                    }
                }

                server.peers().remove(&peer_id);
                send_loop.abort();
                info!("{peer_id} disconnected");
            });
        }
    }
}

/// Binds `addr` and serves `server` on it.
pub async fn start_event_server(addr: &str, server: EventServer) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Event server listening on ws://{addr}");
    server.serve(listener).await;
    Ok(())
}
