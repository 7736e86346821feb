use serde::Serialize;
use std::fmt;

/// Lifecycle of the shared connection.
///
/// ```text
/// Idle -> Connecting -> Open -> Closing -> Idle
/// Connecting | Open -> Reconnecting -> Connecting
/// Connecting | Reconnecting -> Offline            (terminal until retried)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closing,
    Offline,
}

impl ConnectionState {
    pub fn status(self) -> ConnectionStatus {
        match self {
            ConnectionState::Idle | ConnectionState::Closing => ConnectionStatus::Unknown,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Open => ConnectionStatus::Open,
            ConnectionState::Reconnecting => ConnectionStatus::Reconnecting,
            ConnectionState::Offline => ConnectionStatus::Offline,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closing => "closing",
            ConnectionState::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// Coarse status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Unknown,
    Connecting,
    Open,
    Reconnecting,
    Offline,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(name)
    }
}
