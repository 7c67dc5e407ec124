//! # forkline-telemetry
//!
//! Installs the process-wide `tracing` subscriber and provides
//! [`capture_logs`] for asserting on events in tests.

#![deny(unsafe_code)]

mod capture;

pub use capture::{capture_logs, CapturedEvent, CapturedLogs, CapturedSpan};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "forkline_session" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Parse a level name such as `"debug"`, falling back to INFO.
    pub fn with_level_name(mut self, name: &str) -> Self {
        self.log_level = name.parse().unwrap_or(Level::INFO);
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn filter_directive(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Initialize the global subscriber. Call once at startup.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// is kept.
pub fn init_telemetry(config: &TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert!(!config.json);
        assert_eq!(config.filter_directive(), "info");
    }

    #[test]
    fn module_levels_in_directive() {
        let config = TelemetryConfig {
            module_levels: vec![("forkline_session".into(), Level::DEBUG)],
            ..TelemetryConfig::default()
        };
        assert_eq!(config.filter_directive(), "info,forkline_session=debug");
    }

    #[test]
    fn level_name_parsing() {
        assert_eq!(TelemetryConfig::default().with_level_name("warn").log_level, Level::WARN);
        assert_eq!(TelemetryConfig::default().with_level_name("loud").log_level, Level::INFO);
    }
}
