//! Shared logging bootstrap for lcstitch binaries.

use crate::{Error, Result};

use std::sync::OnceLock;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

static SERVICE_NAME: OnceLock<String> = OnceLock::new();

/// Service name registered by [`Telemetry::init_for_component`], if any.
pub fn service() -> Option<&'static str> {
    SERVICE_NAME.get().map(String::as_str)
}

/// Logging settings resolved from the environment and command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub level: Level,
    /// Extra `RUST_LOG` directives layered over `level`
    pub directives: Option<String>,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str, log_level: &str) -> Result<Self> {
        let service_name = std::env::var("LCSTITCH_SERVICE_NAME")
            .unwrap_or_else(|_| default_service_name.to_string());
        let service_name = service_name.trim();
        if service_name.is_empty() {
            return Err(Error::Config(
                "LCSTITCH_SERVICE_NAME cannot be empty".to_string(),
            ));
        }

        let directives = std::env::var("RUST_LOG")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            service_name: service_name.to_string(),
            level: parse_log_level(log_level)?,
            directives,
        })
    }

    fn filter(&self) -> Result<EnvFilter> {
        let base = self.level.as_str().to_ascii_lowercase();
        let filter = match &self.directives {
            Some(directives) => format!("{base},{directives}"),
            None => base,
        };
        EnvFilter::try_new(&filter)
            .map_err(|e| Error::Config(format!("invalid RUST_LOG directives '{filter}': {e}")))
    }
}

/// Handle returned once the global subscriber is installed.
#[derive(Debug)]
pub struct Telemetry {
    config: TelemetryConfig,
}

impl Telemetry {
    /// Install the JSON tracing subscriber for a binary.
    pub fn init_for_component(default_service_name: &str, log_level: &str) -> Result<Self> {
        let config = TelemetryConfig::from_env(default_service_name, log_level)?;

        FmtSubscriber::builder()
            .with_env_filter(config.filter()?)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .map_err(|e| {
                Error::Config(format!("failed to initialize telemetry subscriber: {e}"))
            })?;

        let _ = SERVICE_NAME.set(config.service_name.clone());

        info!(
            service_name = %config.service_name,
            level = %config.level,
            directives = %config.directives.as_deref().unwrap_or("none"),
            "Telemetry bootstrap initialized"
        );

        Ok(Self { config })
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn level(&self) -> Level {
        self.config.level
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_known_levels() {
        assert_eq!(parse_log_level("INFO").unwrap(), Level::INFO);
        assert_eq!(parse_log_level(" debug ").unwrap(), Level::DEBUG);
    }

    #[test]
    fn parse_log_level_rejects_unknown() {
        let err = parse_log_level("loud").unwrap_err();
        assert!(format!("{err}").contains("invalid log level"));
    }

    #[test]
    fn filter_layers_directives_over_level() {
        let config = TelemetryConfig {
            service_name: "lcstitch-worker".to_string(),
            level: Level::WARN,
            directives: Some("lcstitch=debug".to_string()),
        };
        let filter = config.filter().unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("lcstitch=debug"));
        assert!(rendered.contains("warn"));
    }
}
