//! Configuration schema definitions.
//!
//! All durations are expressed in milliseconds (or seconds for the
//! transport timeout) so the struct decodes straight from TOML or JSON.
//! A zero in any field selects the documented default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries when `max_retries` is zero.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Default cap on exponential backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Default overall timeout of the built-in transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Root configuration for the retry client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Caps requests per second (token bucket). 0 = unlimited.
    pub max_rps: u32,

    /// Maximum number of retry attempts. 0 selects the default (3).
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds. 0 selects 200ms.
    pub initial_backoff_ms: u64,

    /// Cap on exponential backoff in milliseconds. 0 selects 2s.
    pub max_backoff_ms: u64,

    /// Overall timeout of the built-in transport in seconds. 0 selects 15s.
    /// Ignored when a custom transport is supplied.
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Apply defaults and convert to durations.
    pub fn resolve(&self) -> RetrySettings {
        RetrySettings {
            max_rps: self.max_rps,
            max_retries: non_zero_or(self.max_retries, DEFAULT_MAX_RETRIES),
            initial_backoff: millis_or(self.initial_backoff_ms, DEFAULT_INITIAL_BACKOFF),
            max_backoff: millis_or(self.max_backoff_ms, DEFAULT_MAX_BACKOFF),
            timeout: if self.timeout_secs == 0 {
                DEFAULT_TIMEOUT
            } else {
                Duration::from_secs(self.timeout_secs)
            },
        }
    }
}

/// Resolved, immutable settings consumed by the layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Requests per second admitted by the limiter; 0 disables it.
    pub max_rps: u32,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First exponential wait.
    pub initial_backoff: Duration,
    /// Upper bound on exponential waits.
    pub max_backoff: Duration,
    /// Deadline applied by the built-in transport.
    pub timeout: Duration,
}

impl RetrySettings {
    /// Total dispatches allowed for one call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        ClientConfig::default().resolve()
    }
}

fn non_zero_or(value: u32, default: u32) -> u32 {
    if value == 0 {
        default
    } else {
        value
    }
}

fn millis_or(value: u64, default: Duration) -> Duration {
    if value == 0 {
        default
    } else {
        Duration::from_millis(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_select_defaults() {
        let settings = ClientConfig::default().resolve();
        assert_eq!(settings.max_rps, 0);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.max_attempts(), 4);
        assert_eq!(settings.initial_backoff, Duration::from_millis(200));
        assert_eq!(settings.max_backoff, Duration::from_secs(2));
        assert_eq!(settings.timeout, Duration::from_secs(15));
    }

    #[test]
    fn explicit_values_are_kept() {
        let config = ClientConfig {
            max_rps: 10,
            max_retries: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 750,
            timeout_secs: 3,
        };
        let settings = config.resolve();
        assert_eq!(settings.max_rps, 10);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.initial_backoff, Duration::from_millis(50));
        assert_eq!(settings.max_backoff, Duration::from_millis(750));
        assert_eq!(settings.timeout, Duration::from_secs(3));
    }
}
