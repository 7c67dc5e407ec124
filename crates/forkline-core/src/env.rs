//! The browser environment a fork runs in, injected so the protocol never
//! touches global singletons.
//!
//! Two storage scopes exist:
//! - **ephemeral**: per tab, cleared when the tab session ends
//! - **durable**: per device, shared by every tab of the origin

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Navigation, storage and clock access for one browser tab.
pub trait ForkEnvironment: Send + Sync {
    /// Full-page navigation (replaces the current history entry).
    fn navigate(&self, url: &str);

    /// Absolute URL of the current page, fragment included.
    fn current_url(&self) -> String;

    /// Drop the fragment from the current URL.
    fn clear_fragment(&self);

    fn read_ephemeral(&self, key: &str) -> Option<String>;
    fn write_ephemeral(&self, key: &str, value: &str);
    fn remove_ephemeral(&self, key: &str);

    fn read_durable(&self, key: &str) -> Option<String>;
    fn write_durable(&self, key: &str, value: &str);
    fn remove_durable(&self, key: &str);

    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
struct TabState {
    current_url: String,
    navigations: Vec<String>,
    ephemeral: HashMap<String, String>,
    now: Option<DateTime<Utc>>,
}

/// In-memory environment for tests and the CLI.
///
/// Each instance is one tab. [`MemoryEnvironment::open_tab`] creates a sibling
/// tab that shares durable storage but has its own ephemeral scope.
#[derive(Clone, Debug)]
pub struct MemoryEnvironment {
    tab: Arc<Mutex<TabState>>,
    durable: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryEnvironment {
    pub fn new(current_url: impl Into<String>) -> Self {
        Self {
            tab: Arc::new(Mutex::new(TabState {
                current_url: current_url.into(),
                ..TabState::default()
            })),
            durable: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A new tab on the same device.
    pub fn open_tab(&self, current_url: impl Into<String>) -> Self {
        Self {
            tab: Arc::new(Mutex::new(TabState {
                current_url: current_url.into(),
                ..TabState::default()
            })),
            durable: Arc::clone(&self.durable),
        }
    }

    pub fn set_current_url(&self, url: impl Into<String>) {
        self.tab.lock().current_url = url.into();
    }

    /// Pin the clock.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.tab.lock().now = Some(now);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.tab.lock().navigations.clone()
    }

    pub fn last_navigation(&self) -> Option<String> {
        self.tab.lock().navigations.last().cloned()
    }

    pub fn ephemeral_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tab.lock().ephemeral.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn durable_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.durable.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ForkEnvironment for MemoryEnvironment {
    fn navigate(&self, url: &str) {
        let mut tab = self.tab.lock();
        tab.navigations.push(url.to_string());
        tab.current_url = url.to_string();
    }

    fn current_url(&self) -> String {
        self.tab.lock().current_url.clone()
    }

    fn clear_fragment(&self) {
        let mut tab = self.tab.lock();
        if let Some(idx) = tab.current_url.find('#') {
            tab.current_url.truncate(idx);
        }
    }

    fn read_ephemeral(&self, key: &str) -> Option<String> {
        self.tab.lock().ephemeral.get(key).cloned()
    }

    fn write_ephemeral(&self, key: &str, value: &str) {
        let _ = self
            .tab
            .lock()
            .ephemeral
            .insert(key.to_string(), value.to_string());
    }

    fn remove_ephemeral(&self, key: &str) {
        let _ = self.tab.lock().ephemeral.remove(key);
    }

    fn read_durable(&self, key: &str) -> Option<String> {
        self.durable.lock().get(key).cloned()
    }

    fn write_durable(&self, key: &str, value: &str) {
        let _ = self
            .durable
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_durable(&self, key: &str) {
        let _ = self.durable.lock().remove(key);
    }

    fn now(&self) -> DateTime<Utc> {
        self.tab.lock().now.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn navigate_records_and_moves() {
        let env = MemoryEnvironment::new("https://mail.example.com/inbox");
        env.navigate("https://account.example.com/authorize?app=mail");
        assert_eq!(env.navigations().len(), 1);
        assert_eq!(env.current_url(), "https://account.example.com/authorize?app=mail");
    }

    #[test]
    fn clear_fragment_strips_hash() {
        let env = MemoryEnvironment::new("https://mail.example.com/login#selector=abc&sk=def");
        env.clear_fragment();
        assert_eq!(env.current_url(), "https://mail.example.com/login");
        env.clear_fragment();
        assert_eq!(env.current_url(), "https://mail.example.com/login");
    }

    #[test]
    fn ephemeral_is_per_tab() {
        let first = MemoryEnvironment::new("https://mail.example.com/");
        first.write_ephemeral("fabc", "{}");
        let second = first.open_tab("https://mail.example.com/");
        assert!(second.read_ephemeral("fabc").is_none());
        assert_eq!(first.read_ephemeral("fabc").as_deref(), Some("{}"));
    }

    #[test]
    fn durable_is_shared_across_tabs() {
        let first = MemoryEnvironment::new("https://mail.example.com/");
        let second = first.open_tab("https://mail.example.com/");
        first.write_durable("ps0", "record");
        assert_eq!(second.read_durable("ps0").as_deref(), Some("record"));
        second.remove_durable("ps0");
        assert!(first.read_durable("ps0").is_none());
    }

    #[test]
    fn pinned_clock() {
        let env = MemoryEnvironment::new("https://mail.example.com/");
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        env.set_now(t);
        assert_eq!(env.now(), t);
    }
}
