use rand::Rng;
use std::time::Duration;

use crate::config::ConnectionSettings;

/// How long to wait before each reconnect attempt.
///
/// The delay for attempt `n` (0-based) is `initial * multiplier^n`, capped at
/// `max_delay`, then spread by up to `±jitter_ratio` so that many clients
/// dropped by the same server restart do not reconnect in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_ratio: f64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Same delay every time, no jitter, no limit.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_ratio: 0.0,
            max_attempts: None,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_delay: Duration::from_millis(
                settings.max_reconnect_delay_ms.max(settings.reconnect_delay_ms),
            ),
            multiplier: settings.backoff_multiplier,
            jitter_ratio: settings.jitter_ratio,
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before reconnect attempt `attempt`, or `None` once the attempt
    /// budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let base = self.base_delay(attempt);
        Some(self.jitter(base))
    }

    /// The un-jittered delay for `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let cap = self.max_delay.as_secs_f64();
        let growth = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = (initial * growth).min(cap);
        if secs.is_finite() {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.max_delay
        }
    }

    fn jitter(&self, base: Duration) -> Duration {
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        if ratio == 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::rng().random_range((1.0 - ratio)..=(1.0 + ratio));
        base.mul_f64(factor)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_settings(&crate::config::Settings::default().connection)
    }
}
