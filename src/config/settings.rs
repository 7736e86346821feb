use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Groups where to connect, how to recover from drops, how to check liveness
/// and how loudly to log.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: EndpointSettings,
    pub connection: ConnectionSettings,
    pub keepalive: KeepaliveSettings,
    pub logging: LoggingSettings,
}

/// Where the event stream lives.
///
/// `url` wins when set; otherwise the URL is assembled from the other fields.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EndpointSettings {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub path: String,
}

/// Reconnect policy and transport timeouts.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ratio: f64,
    pub max_reconnect_attempts: Option<u32>,
    pub connect_timeout_ms: u64,
    pub close_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct KeepaliveSettings {
    pub interval_ms: u64,
    pub timeout_multiplier: u32,
    pub protocol_ping: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub endpoint: Option<PartialEndpointSettings>,
    pub connection: Option<PartialConnectionSettings>,
    pub keepalive: Option<PartialKeepaliveSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialEndpointSettings {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialConnectionSettings {
    pub reconnect_delay_ms: Option<u64>,
    pub max_reconnect_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub jitter_ratio: Option<f64>,
    pub max_reconnect_attempts: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub close_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialKeepaliveSettings {
    pub interval_ms: Option<u64>,
    pub timeout_multiplier: Option<u32>,
    pub protocol_ping: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// The defaults point at the backend's `/ws/chunks` stream on port 8000 and
/// keep its 30 second keepalive cadence.
impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                url: None,
                host: "localhost".to_string(),
                port: 8000,
                secure: true,
                path: "/ws/chunks".to_string(),
            },
            connection: ConnectionSettings {
                reconnect_delay_ms: 3_000,
                max_reconnect_delay_ms: 30_000,
                backoff_multiplier: 2.0,
                jitter_ratio: 0.2,
                max_reconnect_attempts: None,
                connect_timeout_ms: 10_000,
                close_timeout_ms: 1_000,
            },
            keepalive: KeepaliveSettings {
                interval_ms: 30_000,
                timeout_multiplier: 3,
                protocol_ping: true,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let endpoint = self.endpoint.unwrap_or_default();
        let connection = self.connection.unwrap_or_default();
        let keepalive = self.keepalive.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            endpoint: EndpointSettings {
                url: endpoint.url.or(defaults.endpoint.url),
                host: endpoint.host.unwrap_or(defaults.endpoint.host),
                port: endpoint.port.unwrap_or(defaults.endpoint.port),
                secure: endpoint.secure.unwrap_or(defaults.endpoint.secure),
                path: endpoint.path.unwrap_or(defaults.endpoint.path),
            },
            connection: ConnectionSettings {
                reconnect_delay_ms: connection
                    .reconnect_delay_ms
                    .unwrap_or(defaults.connection.reconnect_delay_ms),
                max_reconnect_delay_ms: connection
                    .max_reconnect_delay_ms
                    .unwrap_or(defaults.connection.max_reconnect_delay_ms),
                backoff_multiplier: connection
                    .backoff_multiplier
                    .unwrap_or(defaults.connection.backoff_multiplier),
                jitter_ratio: connection
                    .jitter_ratio
                    .unwrap_or(defaults.connection.jitter_ratio),
                max_reconnect_attempts: connection
                    .max_reconnect_attempts
                    .or(defaults.connection.max_reconnect_attempts),
                connect_timeout_ms: connection
                    .connect_timeout_ms
                    .unwrap_or(defaults.connection.connect_timeout_ms),
                close_timeout_ms: connection
                    .close_timeout_ms
                    .unwrap_or(defaults.connection.close_timeout_ms),
            },
            keepalive: KeepaliveSettings {
                interval_ms: keepalive
                    .interval_ms
                    .unwrap_or(defaults.keepalive.interval_ms),
                timeout_multiplier: keepalive
                    .timeout_multiplier
                    .unwrap_or(defaults.keepalive.timeout_multiplier),
                protocol_ping: keepalive
                    .protocol_ping
                    .unwrap_or(defaults.keepalive.protocol_ping),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}
