//! Ephemeral fork-state store.
//!
//! Maps a state token to the URL the user was on when the fork was requested.
//! Entries live in the tab's ephemeral storage under `f<state>` as
//! `{"url": "..."}`, so they are never visible to another tab.

use forkline_core::env::ForkEnvironment;
use serde::{Deserialize, Serialize};
use tracing::debug;

const KEY_PREFIX: &str = "f";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkState {
    pub token: String,
    pub origin_url: String,
}

#[derive(Serialize, Deserialize)]
struct StoredForkState {
    url: String,
}

pub struct ForkStateStore<'a> {
    env: &'a dyn ForkEnvironment,
}

impl<'a> ForkStateStore<'a> {
    pub fn new(env: &'a dyn ForkEnvironment) -> Self {
        Self { env }
    }

    pub fn put(&self, state: &ForkState) {
        let stored = StoredForkState {
            url: state.origin_url.clone(),
        };
        // Serializing a single string field can not fail.
        let json = serde_json::to_string(&stored).unwrap_or_default();
        self.env.write_ephemeral(&storage_key(&state.token), &json);
    }

    /// Missing and malformed entries both read as `None`.
    pub fn get(&self, token: &str) -> Option<ForkState> {
        let raw = self.env.read_ephemeral(&storage_key(token))?;
        match serde_json::from_str::<StoredForkState>(&raw) {
            Ok(stored) => Some(ForkState {
                token: token.to_string(),
                origin_url: stored.url,
            }),
            Err(e) => {
                debug!(error = %e, "malformed fork state entry");
                None
            }
        }
    }

    /// Read an entry and remove it, so a state token resolves at most once.
    pub fn take(&self, token: &str) -> Option<ForkState> {
        let state = self.get(token);
        self.env.remove_ephemeral(&storage_key(token));
        state
    }
}

fn storage_key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}
