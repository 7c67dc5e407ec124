//! # forkline-settings
//!
//! Layered configuration for the fork flow.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ForkSettings::default()`]
//! 2. **User file**: `~/.forkline/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `FORKLINE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, load_settings_with,
    parse_bool, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<ForkSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loaded on first call; falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static ForkSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ForkSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: ForkSettings) -> std::result::Result<(), ForkSettings> {
    SETTINGS.set(settings)
}
