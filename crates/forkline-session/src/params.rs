//! URL wire formats.
//!
//! - authorize redirect query: `app`, `state`, `u`, `t`, `plan`
//! - fork landing fragment: `selector`, `state`, `sk`, `p`, `tr`, `t`
//!
//! The landing carries key material, so it travels in the fragment: browsers
//! never send fragments to servers and access logs never see them.

use std::collections::HashMap;

use forkline_core::apps::{App, ForkType};
use forkline_core::env::ForkEnvironment;
use forkline_core::errors::ForkError;
use forkline_core::ids::ForkSelector;
use forkline_crypto::ForkKey;
use url::form_urlencoded;
use url::Url;

use crate::validation::{
    truncate_state, validated_app, validated_fork_type, validated_local_id, validated_raw_key,
};

pub const DEFAULT_STATE_MAX_LEN: usize = 100;

/// First value per key, the way `URLSearchParams::get` reads.
fn parse_pairs(input: &str) -> HashMap<String, String> {
    let trimmed = input.trim_start_matches(['#', '?']);
    let mut map = HashMap::new();
    for (k, v) in form_urlencoded::parse(trimmed.as_bytes()) {
        map.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    map
}

fn get<'m>(map: &'m HashMap<String, String>, key: &str) -> &'m str {
    map.get(key).map(String::as_str).unwrap_or("")
}

fn parse_url(url: &str) -> Result<Url, ForkError> {
    Url::parse(url).map_err(|e| ForkError::InvalidParameters(format!("invalid url: {e}")))
}

/// Query for the account app's authorize endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizeQuery {
    pub app: App,
    pub state: String,
    pub local_id: Option<u32>,
    pub fork_type: Option<ForkType>,
    pub plan: Option<String>,
}

impl AuthorizeQuery {
    pub fn to_query_string(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("app", self.app.as_str());
        ser.append_pair("state", &self.state);
        if let Some(local_id) = self.local_id {
            ser.append_pair("u", &local_id.to_string());
        }
        if let Some(fork_type) = self.fork_type {
            ser.append_pair("t", fork_type.as_str());
        }
        if let Some(plan) = &self.plan {
            ser.append_pair("plan", plan);
        }
        ser.finish()
    }
}

/// Parameters the account app reads when asked to produce a fork.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProduceForkParameters {
    pub state: String,
    pub app: Option<App>,
    pub local_id: Option<u32>,
    pub fork_type: Option<ForkType>,
    pub plan: Option<String>,
}

impl ProduceForkParameters {
    pub fn from_query(query: &str, max_state_len: usize) -> Self {
        let map = parse_pairs(query);
        let plan = get(&map, "plan");
        Self {
            state: truncate_state(get(&map, "state"), max_state_len),
            app: validated_app(get(&map, "app")),
            local_id: validated_local_id(get(&map, "u")),
            fork_type: validated_fork_type(get(&map, "t")),
            plan: (!plan.is_empty()).then(|| plan.to_string()),
        }
    }

    pub fn from_url(url: &str, max_state_len: usize) -> Result<Self, ForkError> {
        let url = parse_url(url)?;
        Ok(Self::from_query(url.query().unwrap_or(""), max_state_len))
    }
}

/// Fields encoded into a fork landing fragment.
#[derive(Debug)]
pub struct LandingFragment<'a> {
    pub selector: &'a ForkSelector,
    pub state: &'a str,
    pub key: Option<&'a ForkKey>,
    pub persistent: bool,
    pub trusted: bool,
    pub fork_type: Option<ForkType>,
}

impl LandingFragment<'_> {
    pub fn encode(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("selector", self.selector.as_str());
        ser.append_pair("state", self.state);
        if let Some(key) = self.key {
            ser.append_pair("sk", &key.to_base64url());
        }
        if self.persistent {
            ser.append_pair("p", "1");
        }
        if self.trusted {
            ser.append_pair("tr", "1");
        }
        if let Some(fork_type) = self.fork_type {
            ser.append_pair("t", fork_type.as_str());
        }
        ser.finish()
    }
}

/// Parameters parsed from a fork landing. Owned by value so one landing is
/// consumed at most once.
#[derive(Debug)]
pub struct ConsumeForkParameters {
    pub selector: ForkSelector,
    pub state: String,
    /// Absent when the producer attached no payload, or when `sk` was invalid.
    pub key: Option<ForkKey>,
    pub fork_type: Option<ForkType>,
    pub persistent: bool,
    pub trusted: bool,
}

impl ConsumeForkParameters {
    pub fn from_fragment(fragment: &str, max_state_len: usize) -> Self {
        let map = parse_pairs(fragment);
        let raw_key = get(&map, "sk");
        Self {
            selector: ForkSelector::from_raw(get(&map, "selector")),
            state: truncate_state(get(&map, "state"), max_state_len),
            key: (!raw_key.is_empty()).then(|| validated_raw_key(raw_key)).flatten(),
            fork_type: validated_fork_type(get(&map, "t")),
            persistent: get(&map, "p") == "1",
            trusted: get(&map, "tr") == "1",
        }
    }

    pub fn from_url(url: &str, max_state_len: usize) -> Result<Self, ForkError> {
        let url = parse_url(url)?;
        Ok(Self::from_fragment(url.fragment().unwrap_or(""), max_state_len))
    }

    /// Parse the landing from the environment's current URL.
    pub fn from_env(env: &dyn ForkEnvironment, max_state_len: usize) -> Result<Self, ForkError> {
        Self::from_url(&env.current_url(), max_state_len)
    }
}

/// Clear the landing fragment so the key does not linger in history.
pub fn remove_hash_parameters(env: &dyn ForkEnvironment) {
    env.clear_fragment();
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkline_core::env::MemoryEnvironment;

    #[test]
    fn authorize_query_minimal() {
        let q = AuthorizeQuery {
            app: App::Mail,
            state: "st".into(),
            local_id: None,
            fork_type: None,
            plan: None,
        };
        assert_eq!(q.to_query_string(), "app=mail&state=st");
    }

    #[test]
    fn authorize_query_full() {
        let q = AuthorizeQuery {
            app: App::Drive,
            state: "st".into(),
            local_id: Some(3),
            fork_type: Some(ForkType::Switch),
            plan: Some("plus".into()),
        };
        assert_eq!(q.to_query_string(), "app=drive&state=st&u=3&t=switch&plan=plus");
    }

    #[test]
    fn produce_parameters_validated() {
        let p = ProduceForkParameters::from_query("?app=calendar&state=abc&u=7&t=signup&plan=visionary", 100);
        assert_eq!(p.app, Some(App::Calendar));
        assert_eq!(p.state, "abc");
        assert_eq!(p.local_id, Some(7));
        assert_eq!(p.fork_type, Some(ForkType::Signup));
        assert_eq!(p.plan.as_deref(), Some("visionary"));
    }

    #[test]
    fn produce_parameters_invalid_values_absent() {
        let p = ProduceForkParameters::from_query("app=nope&u=-3&t=other", 100);
        assert_eq!(p.app, None);
        assert_eq!(p.local_id, None);
        assert_eq!(p.fork_type, None);
        assert_eq!(p.plan, None);
        assert_eq!(p.state, "");
    }

    #[test]
    fn produce_parameters_truncate_state() {
        let query = format!("state={}", "s".repeat(300));
        assert_eq!(ProduceForkParameters::from_query(&query, 100).state.len(), 100);
    }

    #[test]
    fn produce_parameters_from_url() {
        let p = ProduceForkParameters::from_url(
            "https://account.example.com/authorize?app=mail&state=xyz",
            100,
        )
        .unwrap();
        assert_eq!(p.app, Some(App::Mail));
        assert_eq!(p.state, "xyz");
    }

    #[test]
    fn landing_fragment_flags() {
        let selector = ForkSelector::from_raw("sel1");
        let key = ForkKey::generate();
        let frag = LandingFragment {
            selector: &selector,
            state: "st",
            key: Some(&key),
            persistent: true,
            trusted: false,
            fork_type: None,
        }
        .encode();
        assert!(frag.starts_with("selector=sel1&state=st&sk="));
        assert!(frag.ends_with("&p=1"));
        assert!(!frag.contains("tr="));
        assert!(!frag.contains("t="));
    }

    #[test]
    fn landing_fragment_without_key_omits_sk() {
        let selector = ForkSelector::from_raw("sel1");
        let frag = LandingFragment {
            selector: &selector,
            state: "st",
            key: None,
            persistent: false,
            trusted: true,
            fork_type: Some(ForkType::Switch),
        }
        .encode();
        assert_eq!(frag, "selector=sel1&state=st&tr=1&t=switch");
    }

    #[test]
    fn consume_parameters_parse_landing() {
        let key = ForkKey::generate();
        let fragment = format!("#selector=sel9&state=st9&sk={}&p=1&tr=1&t=switch", key.to_base64url());
        let p = ConsumeForkParameters::from_fragment(&fragment, 100);
        assert_eq!(p.selector.as_str(), "sel9");
        assert_eq!(p.state, "st9");
        assert_eq!(p.key.unwrap().expose(), key.expose());
        assert!(p.persistent);
        assert!(p.trusted);
        assert_eq!(p.fork_type, Some(ForkType::Switch));
    }

    #[test]
    fn consume_parameters_flags_need_literal_one() {
        let p = ConsumeForkParameters::from_fragment("selector=s&state=t&p=true&tr=0", 100);
        assert!(!p.persistent);
        assert!(!p.trusted);
        assert!(p.key.is_none());
    }

    #[test]
    fn consume_parameters_invalid_key_absent() {
        let p = ConsumeForkParameters::from_fragment("selector=s&state=t&sk=short", 100);
        assert!(p.key.is_none());
    }

    #[test]
    fn consume_parameters_from_env_and_clear() {
        let env = MemoryEnvironment::new("https://mail.example.com/login#selector=abc&state=def");
        let p = ConsumeForkParameters::from_env(&env, 100).unwrap();
        assert_eq!(p.selector.as_str(), "abc");
        remove_hash_parameters(&env);
        assert_eq!(env.current_url(), "https://mail.example.com/login");
    }

    #[test]
    fn unparseable_url_is_invalid_parameters() {
        assert!(matches!(
            ConsumeForkParameters::from_url("not a url", 100),
            Err(ForkError::InvalidParameters(_))
        ));
    }
}
