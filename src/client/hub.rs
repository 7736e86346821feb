use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::client::handle::EventClient;
use crate::connection::options::ClientOptions;
use crate::transport::endpoint::normalize;
use crate::transport::websocket::{Connector, WebSocketConnector};

/// Hands out one [`EventClient`] per endpoint so that independent parts of
/// an application end up sharing a single connection.
///
/// `http://host/ws` and `ws://host/ws` are the same endpoint.
pub struct EventHub {
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    clients: Mutex<HashMap<String, EventClient>>,
}

impl EventHub {
    pub fn new(options: ClientOptions) -> Self {
        Self::with_connector(options, Arc::new(WebSocketConnector))
    }

    pub fn with_connector(options: ClientOptions, connector: Arc<dyn Connector>) -> Self {
        Self {
            options,
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The shared client for `endpoint`, created on first use.
    pub fn client(&self, endpoint: &str) -> EventClient {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients
            .entry(normalize(endpoint))
            .or_insert_with(|| {
                EventClient::with_connector(endpoint, self.options.clone(), self.connector.clone())
            })
            .clone()
    }

    pub fn endpoints(&self) -> Vec<String> {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let mut endpoints: Vec<String> = clients.keys().cloned().collect();
        endpoints.sort();
        endpoints
    }

    /// Shuts down every client and forgets them.
    pub fn shutdown(&self) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, client) in clients.drain() {
            client.shutdown();
        }
    }
}
