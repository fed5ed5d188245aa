//! Optional log output for hosts without their own `tracing` subscriber
//!
//! The crates only emit `tracing` events. [`Hub::start`](crate::Hub::start)
//! calls [`init_logging`] with [`HubConfig::log_mode`](crate::HubConfig),
//! which is a no-op for [`LoggingMode::Silent`] and whenever a global
//! subscriber is already in place.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{HubError, Result};

/// Environment variable replacing the default filter directives
pub const ENV_LOG_LEVEL: &str = "DIRIGERA_LOG_LEVEL";

/// What [`init_logging`] installs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Install nothing
    #[default]
    Silent,
    /// Compact lines: connection health from the hub crates, warnings from
    /// everything else
    Development,
    /// Per-event routing, with thread names and source lines
    Debug,
}

impl LoggingMode {
    /// Filter used when neither `DIRIGERA_LOG_LEVEL` nor `RUST_LOG` is set
    pub fn default_directives(self) -> &'static str {
        match self {
            LoggingMode::Silent => "off",
            LoggingMode::Development => "warn,dirigera_state=info,dirigera_api=info",
            LoggingMode::Debug => "info,dirigera_state=trace,dirigera_api=debug",
        }
    }
}

impl FromStr for LoggingMode {
    type Err = HubError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "silent" | "off" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            other => Err(HubError::InvalidConfig(format!(
                "unknown log mode {other:?}; expected silent, development or debug"
            ))),
        }
    }
}

/// Install a global subscriber for `mode`
///
/// Leaves an existing subscriber alone, so a host that set up `tracing`
/// itself keeps its own output.
pub fn init_logging(mode: LoggingMode) -> Result<()> {
    if mode == LoggingMode::Silent || tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = filter_for(mode)?;
    let installed = match mode {
        LoggingMode::Debug => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(fmt::layer().compact().with_target(false))
            .with(filter)
            .try_init(),
    };

    installed.map_err(|e| HubError::Logging(e.to_string()))
}

fn filter_for(mode: LoggingMode) -> Result<EnvFilter> {
    let directives = std::env::var(ENV_LOG_LEVEL)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| mode.default_directives().to_string());
    parse_filter(&directives)
}

fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| HubError::InvalidConfig(format!("log filter {directives:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("silent", LoggingMode::Silent)]
    #[case("", LoggingMode::Silent)]
    #[case("Development", LoggingMode::Development)]
    #[case(" dev ", LoggingMode::Development)]
    #[case("debug", LoggingMode::Debug)]
    fn test_parse_mode(#[case] raw: &str, #[case] expected: LoggingMode) {
        assert_eq!(raw.parse::<LoggingMode>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(matches!(
            "verbose".parse::<LoggingMode>(),
            Err(HubError::InvalidConfig(_))
        ));
    }

    #[rstest]
    #[case(LoggingMode::Development)]
    #[case(LoggingMode::Debug)]
    fn test_default_directives_name_hub_crates(#[case] mode: LoggingMode) {
        let directives = mode.default_directives();
        assert!(directives.contains("dirigera_state="));
        assert!(directives.contains("dirigera_api="));
        assert!(parse_filter(directives).is_ok());
    }

    #[test]
    fn test_silent_installs_nothing() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_init_leaves_existing_subscriber() {
        assert!(init_logging(LoggingMode::Development).is_ok());
        assert!(tracing::dispatcher::has_been_set());
        assert!(init_logging(LoggingMode::Debug).is_ok());
    }
}
