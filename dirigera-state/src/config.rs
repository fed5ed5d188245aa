//! Configuration for the hub supervisor
//!
//! Controls the reconnect backoff ladder, how long `stop()` waits for the
//! worker, the worker thread's name, and optional log output.

use std::time::Duration;

use crate::error::{HubError, Result};
use crate::logging::LoggingMode;

/// Default reconnect delays, in seconds
pub const DEFAULT_BACKOFF_SECS: [u64; 8] = [1, 1, 2, 3, 5, 8, 13, 20];

/// Environment variable overriding [`HubConfig::shutdown_timeout`], in seconds
pub const ENV_SHUTDOWN_TIMEOUT: &str = "DIRIGERA_SHUTDOWN_TIMEOUT_SECS";

/// Environment variable overriding [`HubConfig::backoff_ladder`]
///
/// Comma-separated seconds, e.g. `"1,2,4,8"`.
pub const ENV_BACKOFF_LADDER: &str = "DIRIGERA_BACKOFF_LADDER";

/// Environment variable selecting [`HubConfig::log_mode`]
///
/// One of `silent`, `development` or `debug`.
pub const ENV_LOG_MODE: &str = "DIRIGERA_LOG_MODE";

/// Configuration for the [`Hub`](crate::Hub)
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Delays used between failed snapshot fetches, in order
    /// Default: 1, 1, 2, 3, 5, 8, 13, 20 seconds. The last entry repeats.
    pub backoff_ladder: Vec<Duration>,

    /// How long `stop()` waits for the worker to exit
    /// Default: 15 seconds
    pub shutdown_timeout: Duration,

    /// Name given to the background worker thread
    /// Default: "dirigera-hub"
    pub worker_thread_name: String,

    /// Log output installed by `start()` if the host has none
    /// Default: Silent
    pub log_mode: LoggingMode,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            backoff_ladder: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            shutdown_timeout: Duration::from_secs(15),
            worker_thread_name: "dirigera-hub".to_string(),
            log_mode: LoggingMode::Silent,
        }
    }
}

impl HubConfig {
    /// Create a new HubConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Millisecond-scale retries and a short shutdown timeout
    ///
    /// Useful for tests and demos against a local mock hub.
    pub fn fast_retry() -> Self {
        Self {
            backoff_ladder: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            shutdown_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Read overrides from the environment on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ENV_SHUTDOWN_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                HubError::InvalidConfig(format!("{ENV_SHUTDOWN_TIMEOUT}={raw:?} is not a number"))
            })?;
            config.shutdown_timeout = Duration::from_secs(secs);
        }

        if let Ok(raw) = std::env::var(ENV_BACKOFF_LADDER) {
            config.backoff_ladder = parse_ladder(&raw)?;
        }

        if let Ok(raw) = std::env::var(ENV_LOG_MODE) {
            config.log_mode = raw.parse()?;
        }

        Ok(config)
    }

    pub fn with_backoff_ladder(mut self, ladder: Vec<Duration>) -> Self {
        self.backoff_ladder = ladder;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    pub fn with_log_mode(mut self, mode: LoggingMode) -> Self {
        self.log_mode = mode;
        self
    }
}

fn parse_ladder(raw: &str) -> Result<Vec<Duration>> {
    let ladder = raw
        .split(',')
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(|step| {
            step.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                HubError::InvalidConfig(format!("{ENV_BACKOFF_LADDER} step {step:?} is not a number"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if ladder.is_empty() {
        return Err(HubError::InvalidConfig(format!(
            "{ENV_BACKOFF_LADDER} must contain at least one step"
        )));
    }

    Ok(ladder)
}
