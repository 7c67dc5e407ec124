use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// First-party applications that can produce or consume a fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum App {
    Account,
    Mail,
    Calendar,
    Drive,
    VpnSettings,
}

impl App {
    pub const ALL: [App; 5] = [
        App::Account,
        App::Mail,
        App::Calendar,
        App::Drive,
        App::VpnSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Mail => "mail",
            Self::Calendar => "calendar",
            Self::Drive => "drive",
            Self::VpnSettings => "vpn-settings",
        }
    }

    /// Client identifier the session API knows this application by.
    pub fn client_id(&self) -> &'static str {
        match self {
            Self::Account => "web-account",
            Self::Mail => "web-mail",
            Self::Calendar => "web-calendar",
            Self::Drive => "web-drive",
            Self::VpnSettings => "web-vpn-settings",
        }
    }

    /// Default subdomain the application is served from.
    pub fn subdomain(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Mail => "mail",
            Self::Calendar => "calendar",
            Self::Drive => "drive",
            Self::VpnSettings => "vpn",
        }
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for App {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        App::ALL
            .into_iter()
            .find(|app| app.as_str() == s)
            .ok_or_else(|| format!("unknown app: {s}"))
    }
}

/// Why a fork was requested. Carried as `t` in both the authorize query and
/// the consume fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkType {
    /// Account switch: return to the requesting app's root, not the page.
    Switch,
    Signup,
}

impl ForkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Signup => "signup",
        }
    }
}

impl fmt::Display for ForkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForkType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(Self::Switch),
            "signup" => Ok(Self::Signup),
            other => Err(format!("unknown fork type: {other}")),
        }
    }
}

/// Well-known single sign-on paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsoPaths {
    /// Account-app path that starts a fork on behalf of another app.
    pub authorize: String,
    /// Target-app path that consumes a fork landing.
    pub fork: String,
}

impl Default for SsoPaths {
    fn default() -> Self {
        Self {
            authorize: "/authorize".to_string(),
            fork: "/login".to_string(),
        }
    }
}

/// Resolves application URLs from a scheme, a base domain and optional
/// per-app subdomain overrides.
#[derive(Clone, Debug)]
pub struct AppUrls {
    scheme: String,
    base_domain: String,
    subdomains: HashMap<App, String>,
    pub paths: SsoPaths,
}

impl AppUrls {
    pub fn new(scheme: impl Into<String>, base_domain: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            base_domain: base_domain.into(),
            subdomains: HashMap::new(),
            paths: SsoPaths::default(),
        }
    }

    pub fn with_subdomain(mut self, app: App, subdomain: impl Into<String>) -> Self {
        let _ = self.subdomains.insert(app, subdomain.into());
        self
    }

    pub fn with_paths(mut self, paths: SsoPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn host(&self, app: App) -> String {
        let sub = self
            .subdomains
            .get(&app)
            .map(String::as_str)
            .unwrap_or_else(|| app.subdomain());
        format!("{sub}.{}", self.base_domain)
    }

    /// Absolute URL for `path` (which may carry a query or fragment) on `app`.
    pub fn href(&self, path: &str, app: App) -> String {
        let host = self.host(app);
        if path.starts_with('/') {
            format!("{}://{host}{path}", self.scheme)
        } else {
            format!("{}://{host}/{path}", self.scheme)
        }
    }
}

impl Default for AppUrls {
    fn default() -> Self {
        Self::new("https", "example.com")
    }
}
