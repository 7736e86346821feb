use std::time::Duration;
use tokio::time::Instant;

use crate::config::KeepaliveSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct KeepaliveOptions {
    pub interval: Duration,
    /// Silence longer than `interval * timeout_multiplier` means the link is dead.
    pub timeout_multiplier: u32,
    /// Also send a WebSocket Ping so that servers ignoring the text keepalive
    /// still produce a Pong.
    pub protocol_ping: bool,
}

impl KeepaliveOptions {
    pub fn from_settings(settings: &KeepaliveSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms),
            timeout_multiplier: settings.timeout_multiplier,
            protocol_ping: settings.protocol_ping,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.interval * self.timeout_multiplier.max(1)
    }
}

impl Default for KeepaliveOptions {
    fn default() -> Self {
        Self::from_settings(&crate::config::Settings::default().keepalive)
    }
}

/// Keepalive bookkeeping for one open connection.
///
/// Pure state: the connection task asks it when to ping and when to give up,
/// and tells it when traffic arrives or a ping went out.
#[derive(Debug)]
pub struct Liveness {
    interval: Duration,
    timeout: Duration,
    last_activity: Instant,
    next_ping: Instant,
}

impl Liveness {
    pub fn start(options: &KeepaliveOptions, now: Instant) -> Self {
        let interval = options.interval.max(Duration::from_millis(1));
        Self {
            interval,
            timeout: options.timeout().max(interval),
            last_activity: now,
            next_ping: now + interval,
        }
    }

    /// Any inbound frame counts as proof of life.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn record_ping(&mut self, now: Instant) {
        self.next_ping = now + self.interval;
    }

    pub fn next_ping(&self) -> Instant {
        self.next_ping
    }

    pub fn deadline(&self) -> Instant {
        self.last_activity + self.timeout
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}
