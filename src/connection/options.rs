use std::time::Duration;

use crate::config::Settings;
use crate::connection::backoff::ReconnectPolicy;
use crate::connection::liveness::KeepaliveOptions;

/// Runtime knobs of one connection manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub reconnect: ReconnectPolicy,
    pub keepalive: KeepaliveOptions,
    pub connect_timeout: Duration,
    pub close_timeout: Duration,
}

impl ClientOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            reconnect: ReconnectPolicy::from_settings(&settings.connection),
            keepalive: KeepaliveOptions::from_settings(&settings.keepalive),
            connect_timeout: Duration::from_millis(settings.connection.connect_timeout_ms),
            close_timeout: Duration::from_millis(settings.connection.close_timeout_ms),
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
