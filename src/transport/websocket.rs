//! WebSocket transport
//!
//! The connection manager does not talk to `tokio-tungstenite` directly. It
//! asks a [`Connector`] for a [`FrameTransport`], which is anything that
//! reads and writes WebSocket messages. This keeps the state machine
//! independent of sockets and lets tests script a server by hand.

use futures::future::BoxFuture;
use futures_util::{FutureExt, Sink, Stream};
use tokio_tungstenite::connect_async;
use tracing::debug;
use tungstenite::Error as WsError;
use tungstenite::protocol::Message as WsMessage;

use crate::transport::endpoint::parse_endpoint;
use crate::utils::error::{ClientError, ConnectError};

/// A bidirectional stream of WebSocket messages.
pub trait FrameTransport:
    Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Send + Unpin
{
}

impl<T> FrameTransport for T where
    T: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Send + Unpin
{
}

pub type BoxTransport = Box<dyn FrameTransport>;

/// Opens transports to an endpoint.
///
/// The returned future must not borrow `self` or `endpoint`; the manager
/// drops it to abandon an attempt.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<BoxTransport, ConnectError>>;
}

/// Real connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<BoxTransport, ConnectError>> {
        let endpoint = endpoint.to_string();

        async move {
            let url = parse_endpoint(&endpoint)?;
            debug!(%url, "opening websocket");

            match connect_async(url.as_str()).await {
                Ok((stream, response)) => {
                    debug!(status = %response.status(), "websocket handshake complete");
                    Ok(Box::new(stream) as BoxTransport)
                }
                // tungstenite reports URLs it can never dial (bad host, `wss`
                // without TLS support) as `Url` errors.
                Err(WsError::Url(e)) => Err(ConnectError::Terminal(ClientError::InvalidEndpoint {
                    endpoint,
                    reason: e.to_string(),
                })),
                Err(e) => Err(ConnectError::Transient(e.to_string())),
            }
        }
        .boxed()
    }
}
