//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Default wait budget for suites run without an explicit deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of buffered updates per in-memory watch.
pub const DEFAULT_WATCH_BUFFER: usize = 64;

/// Settings shared by validator suites and the in-memory state source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// How long `ValidatorSuite::run` waits for every validator to pass.
    pub default_timeout: Duration,
    /// Broadcast capacity of the in-memory update feed.
    pub watch_buffer: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            watch_buffer: DEFAULT_WATCH_BUFFER,
        }
    }
}

impl CheckConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a CheckConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `STATECHECK_DEFAULT_TIMEOUT_MS`: suite wait budget (default: 30000)
    /// - `STATECHECK_WATCH_BUFFER`: in-memory watch capacity (default: 64)
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let default_timeout = Duration::from_millis(
            var("STATECHECK_DEFAULT_TIMEOUT_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        );

        let watch_buffer = var("STATECHECK_WATCH_BUFFER")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_WATCH_BUFFER);

        Self {
            default_timeout,
            watch_buffer,
        }
    }

    /// Set the default suite timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the watch buffer capacity.
    pub fn with_watch_buffer(mut self, capacity: usize) -> Self {
        self.watch_buffer = capacity;
        self
    }

    /// Validate the configuration.
    ///
    /// A zero `default_timeout` is allowed and turns suite runs into plain
    /// checks. A zero `watch_buffer` is rejected because the broadcast
    /// channel cannot be created with it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watch_buffer".to_string(),
                value: self.watch_buffer.to_string(),
                reason: "watch_buffer must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
