//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ForkSettings::default()`]
//! 2. If `~/.forkline/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `FORKLINE_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ForkSettings, EXTENSION_TIMEOUT_RANGE_MS};

/// Resolve the path to the settings file (`~/.forkline/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".forkline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ForkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or out-of-range values, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ForkSettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// [`load_settings_from_path`] with an explicit environment lookup.
pub fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ForkSettings> {
    let defaults = serde_json::to_value(ForkSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ForkSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `FORKLINE_*` overrides read through `env`.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut ForkSettings, env: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| env(name).filter(|v| !v.is_empty());

    if let Some(v) = read_string("FORKLINE_BASE_DOMAIN") {
        settings.apps.base_domain = v;
    }
    if let Some(v) = read_string("FORKLINE_SCHEME") {
        if matches!(v.as_str(), "http" | "https") {
            settings.apps.scheme = v;
        } else {
            warn!(key = "FORKLINE_SCHEME", value = %v, "invalid scheme env var, ignoring");
        }
    }
    if let Some(v) = read_string("FORKLINE_EXTENSION_TIMEOUT_MS") {
        let (min, max) = EXTENSION_TIMEOUT_RANGE_MS;
        match parse_u64_range(&v, min, max) {
            Some(ms) => settings.extension.timeout_ms = ms,
            None => warn!(key = "FORKLINE_EXTENSION_TIMEOUT_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    if let Some(v) = read_string("FORKLINE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_string("FORKLINE_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn!(key = "FORKLINE_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_settings(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"apps": {"scheme": "https", "baseDomain": "a.test"}});
        let source = serde_json::json!({"apps": {"baseDomain": "b.test"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["apps"]["baseDomain"], "b.test");
        assert_eq!(merged["apps"]["scheme"], "https");
    }

    #[test]
    fn merge_null_skipped_and_arrays_replaced() {
        let target = serde_json::json!({"a": 1, "list": [1, 2, 3]});
        let source = serde_json::json!({"a": null, "list": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["list"], serde_json::json!([9]));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_with(&dir.path().join("settings.json"), no_env).unwrap();
        assert_eq!(settings, ForkSettings::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let file = write_settings(
            r#"{"apps": {"baseDomain": "corp.test"}, "extension": {"timeoutMs": 30000}}"#,
        );
        let settings = load_settings_with(file.path(), no_env).unwrap();
        assert_eq!(settings.apps.base_domain, "corp.test");
        assert_eq!(settings.apps.scheme, "https");
        assert_eq!(settings.extension.timeout_ms, 30_000);
        assert_eq!(settings.extension.fallback_target, "/");
    }

    #[test]
    fn invalid_json_is_error() {
        let file = write_settings("{not json");
        assert_matches!(load_settings_with(file.path(), no_env), Err(SettingsError::Json(_)));
    }

    #[test]
    fn out_of_range_file_value_is_error() {
        let file = write_settings(r#"{"extension": {"timeoutMs": 5}}"#);
        assert_matches!(
            load_settings_with(file.path(), no_env),
            Err(SettingsError::InvalidValue(_))
        );
    }

    #[test]
    fn env_overrides_win() {
        let file = write_settings(r#"{"apps": {"baseDomain": "file.test"}}"#);
        let env = env_of(&[
            ("FORKLINE_BASE_DOMAIN", "env.test"),
            ("FORKLINE_SCHEME", "http"),
            ("FORKLINE_EXTENSION_TIMEOUT_MS", "2000"),
            ("FORKLINE_LOG_LEVEL", "debug"),
            ("FORKLINE_LOG_JSON", "yes"),
        ]);
        let settings = load_settings_with(file.path(), env).unwrap();
        assert_eq!(settings.apps.base_domain, "env.test");
        assert_eq!(settings.apps.scheme, "http");
        assert_eq!(settings.extension.timeout_ms, 2000);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_of(&[
            ("FORKLINE_SCHEME", "gopher"),
            ("FORKLINE_EXTENSION_TIMEOUT_MS", "999999999"),
            ("FORKLINE_LOG_JSON", "maybe"),
            ("FORKLINE_BASE_DOMAIN", ""),
        ]);
        let settings = load_settings_with(&dir.path().join("none.json"), env).unwrap();
        assert_eq!(settings, ForkSettings::default());
    }

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "YES", "On"] {
            assert_eq!(parse_bool(v), Some(true));
        }
        for v in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(v), Some(false));
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("1000", 1000, 120_000), Some(1000));
        assert_eq!(parse_u64_range("120001", 1000, 120_000), None);
        assert_eq!(parse_u64_range("-1", 1000, 120_000), None);
    }

    #[test]
    fn settings_path_under_home() {
        assert!(settings_path().ends_with(".forkline/settings.json"));
    }
}
