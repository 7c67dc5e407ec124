//! Settings types. Serialized camelCase to match `settings.json`.

use std::collections::HashMap;
use std::time::Duration;

use forkline_core::apps::{App, AppUrls, SsoPaths};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Bounds for `extension.timeoutMs`.
pub const EXTENSION_TIMEOUT_RANGE_MS: (u64, u64) = (1_000, 120_000);

/// Root settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForkSettings {
    pub apps: AppSettings,
    pub paths: PathSettings,
    pub fork: ForkFlowSettings,
    pub extension: ExtensionSettings,
    pub logging: LoggingSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub scheme: String,
    pub base_domain: String,
    /// Per-app subdomain overrides, keyed by app name.
    pub subdomains: HashMap<App, String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            base_domain: "example.com".to_string(),
            subdomains: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathSettings {
    pub authorize: String,
    pub fork: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        let paths = SsoPaths::default();
        Self {
            authorize: paths.authorize,
            fork: paths.fork,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForkFlowSettings {
    /// Longest state token accepted from a URL.
    pub state_max_length: usize,
    /// Keep consumed sessions in durable storage for later resumption.
    pub persist_sessions: bool,
    pub default_persistent: bool,
    pub default_trusted: bool,
}

impl Default for ForkFlowSettings {
    fn default() -> Self {
        Self {
            state_max_length: 100,
            persist_sessions: true,
            default_persistent: false,
            default_trusted: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionSettings {
    pub timeout_ms: u64,
    /// Target origin for the window-message fallback.
    pub fallback_target: String,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            fallback_target: "/".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ForkSettings {
    /// URL resolver for the configured deployment.
    pub fn app_urls(&self) -> AppUrls {
        let paths = SsoPaths {
            authorize: self.paths.authorize.clone(),
            fork: self.paths.fork.clone(),
        };
        let mut urls = AppUrls::new(&self.apps.scheme, &self.apps.base_domain).with_paths(paths);
        for (app, subdomain) in &self.apps.subdomains {
            urls = urls.with_subdomain(*app, subdomain);
        }
        urls
    }

    pub fn extension_timeout(&self) -> Duration {
        Duration::from_millis(self.extension.timeout_ms)
    }

    /// Reject values the fork flow can not run with.
    pub fn validate(&self) -> Result<()> {
        if self.apps.base_domain.is_empty() {
            return Err(SettingsError::InvalidValue("apps.baseDomain is empty".into()));
        }
        if !matches!(self.apps.scheme.as_str(), "http" | "https") {
            return Err(SettingsError::InvalidValue(format!(
                "apps.scheme must be http or https, got {}",
                self.apps.scheme
            )));
        }
        for (name, path) in [("paths.authorize", &self.paths.authorize), ("paths.fork", &self.paths.fork)] {
            if !path.starts_with('/') {
                return Err(SettingsError::InvalidValue(format!(
                    "{name} must start with '/', got {path}"
                )));
            }
        }
        if self.fork.state_max_length == 0 {
            return Err(SettingsError::InvalidValue(
                "fork.stateMaxLength must be positive".into(),
            ));
        }
        let (min, max) = EXTENSION_TIMEOUT_RANGE_MS;
        if !(min..=max).contains(&self.extension.timeout_ms) {
            return Err(SettingsError::InvalidValue(format!(
                "extension.timeoutMs must be within {min}..={max}, got {}",
                self.extension.timeout_ms
            )));
        }
        Ok(())
    }
}
