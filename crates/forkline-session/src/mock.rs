use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use secrecy::ExposeSecret;

use forkline_core::errors::ApiError;
use forkline_core::ids::{ForkSelector, SessionId};
use forkline_core::security::{ApiAuth, SessionTokens};
use forkline_crypto::{KeyMaterial, KEY_LEN};

use crate::api::{ForkGrant, ForkGrantRequest, RedeemedFork, RevokeRequest, SessionApi, User};

/// A session known to the mock, with the credentials to call it.
#[derive(Clone, Debug)]
pub struct MockSession {
    pub uid: SessionId,
    pub tokens: SessionTokens,
}

impl MockSession {
    /// Cookie-style auth, as the producing app calls the API.
    pub fn cookie_auth(&self) -> ApiAuth {
        ApiAuth::Uid(self.uid.clone())
    }

    pub fn bearer_auth(&self) -> ApiAuth {
        ApiAuth::bearer(self.uid.clone(), self.tokens.access_token.clone())
    }
}

struct SessionEntry {
    access_token: String,
    user: User,
}

struct PendingGrant {
    parent: SessionId,
    request: ForkGrantRequest,
}

#[derive(Default)]
struct MockState {
    sessions: HashMap<SessionId, SessionEntry>,
    grants: HashMap<ForkSelector, PendingGrant>,
    redeemed: HashSet<ForkSelector>,
    local_keys: HashMap<SessionId, [u8; KEY_LEN]>,
    revoked: Vec<SessionId>,
    grant_requests: Vec<ForkGrantRequest>,
    calls: Vec<&'static str>,
    fork_local_id: u32,
    grant_failure: Option<ApiError>,
    revoke_failure: Option<ApiError>,
    user_failure: Option<ApiError>,
    oauth_redirect: Option<String>,
}

/// In-memory session API that enforces single-use selectors and credential
/// checks, records every call, and can be scripted to fail.
#[derive(Default)]
pub struct MockSessionApi {
    state: Mutex<MockState>,
}

impl MockSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live session for `user`.
    pub fn add_session(&self, user: User) -> MockSession {
        let mut state = self.state.lock();
        insert_session(&mut state, user)
    }

    /// Local index the next redeemed fork reports.
    pub fn set_fork_local_id(&self, local_id: u32) {
        self.state.lock().fork_local_id = local_id;
    }

    pub fn fail_register_fork_grant(&self, error: ApiError) {
        self.state.lock().grant_failure = Some(error);
    }

    pub fn fail_revoke(&self, error: ApiError) {
        self.state.lock().revoke_failure = Some(error);
    }

    pub fn fail_fetch_user(&self, error: ApiError) {
        self.state.lock().user_failure = Some(error);
    }

    pub fn set_oauth_redirect(&self, redirect_uri: impl Into<String>) {
        self.state.lock().oauth_redirect = Some(redirect_uri.into());
    }

    /// Invalidate a session server-side without recording a revoke call.
    pub fn expire_session(&self, uid: &SessionId) {
        let _ = self.state.lock().sessions.remove(uid);
    }

    pub fn is_active(&self, uid: &SessionId) -> bool {
        self.state.lock().sessions.contains_key(uid)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == name).count()
    }

    pub fn revoked(&self) -> Vec<SessionId> {
        self.state.lock().revoked.clone()
    }

    pub fn grant_requests(&self) -> Vec<ForkGrantRequest> {
        self.state.lock().grant_requests.clone()
    }
}

fn insert_session(state: &mut MockState, user: User) -> MockSession {
    let uid = SessionId::new();
    let tokens = SessionTokens::new(format!("access-{uid}"), format!("refresh-{uid}"));
    let entry = SessionEntry {
        access_token: tokens.access_token.expose_secret().to_string(),
        user,
    };
    let _ = state.sessions.insert(uid.clone(), entry);
    MockSession { uid, tokens }
}

fn authenticate<'s>(state: &'s MockState, auth: &ApiAuth) -> Result<&'s SessionEntry, ApiError> {
    let entry = state
        .sessions
        .get(auth.uid())
        .ok_or_else(|| ApiError::Unauthorized(format!("unknown session {}", auth.uid())))?;
    if let ApiAuth::Bearer { access_token, .. } = auth {
        if access_token.expose_secret() != entry.access_token {
            return Err(ApiError::Unauthorized("access token mismatch".into()));
        }
    }
    Ok(entry)
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn register_fork_grant(
        &self,
        auth: &ApiAuth,
        request: ForkGrantRequest,
    ) -> Result<ForkGrant, ApiError> {
        let mut state = self.state.lock();
        state.calls.push("register_fork_grant");
        if let Some(err) = state.grant_failure.clone() {
            return Err(err);
        }
        let _ = authenticate(&state, auth)?;
        state.grant_requests.push(request.clone());
        let selector = ForkSelector::new();
        let _ = state.grants.insert(
            selector.clone(),
            PendingGrant {
                parent: auth.uid().clone(),
                request,
            },
        );
        Ok(ForkGrant { selector })
    }

    async fn redeem_fork_selector(&self, selector: &ForkSelector) -> Result<RedeemedFork, ApiError> {
        let mut state = self.state.lock();
        state.calls.push("redeem_fork_selector");
        if state.redeemed.contains(selector) {
            return Err(ApiError::Status {
                status: 422,
                body: "fork selector already used".into(),
            });
        }
        let grant = state.grants.remove(selector).ok_or_else(|| ApiError::Status {
            status: 422,
            body: "unknown fork selector".into(),
        })?;
        let _ = state.redeemed.insert(selector.clone());

        let user = state
            .sessions
            .get(&grant.parent)
            .map(|parent| parent.user.clone())
            .ok_or_else(|| ApiError::Unauthorized("parent session gone".into()))?;
        let child = insert_session(&mut state, user);
        Ok(RedeemedFork {
            uid: child.uid,
            tokens: child.tokens,
            payload: grant.request.payload,
            local_id: state.fork_local_id,
        })
    }

    async fn revoke_session(&self, auth: &ApiAuth, _request: RevokeRequest) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push("revoke_session");
        if let Some(err) = state.revoke_failure.clone() {
            return Err(err);
        }
        let _ = authenticate(&state, auth)?;
        let uid = auth.uid().clone();
        let _ = state.sessions.remove(&uid);
        state.revoked.push(uid);
        Ok(())
    }

    async fn fetch_current_user(&self, auth: &ApiAuth) -> Result<User, ApiError> {
        let mut state = self.state.lock();
        state.calls.push("fetch_current_user");
        if let Some(err) = state.user_failure.clone() {
            return Err(err);
        }
        authenticate(&state, auth).map(|entry| entry.user.clone())
    }

    async fn post_oauth_fork(
        &self,
        auth: &ApiAuth,
        client_id: &str,
        oa_session: &str,
    ) -> Result<String, ApiError> {
        let mut state = self.state.lock();
        state.calls.push("post_oauth_fork");
        let _ = authenticate(&state, auth)?;
        Ok(state.oauth_redirect.clone().unwrap_or_else(|| {
            format!("https://oauth.example.net/{client_id}/callback?session={oa_session}")
        }))
    }

    async fn register_local_key(&self, auth: &ApiAuth) -> Result<KeyMaterial, ApiError> {
        let mut state = self.state.lock();
        state.calls.push("register_local_key");
        let _ = authenticate(&state, auth)?;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let _ = state.local_keys.insert(auth.uid().clone(), bytes);
        Ok(KeyMaterial::from_bytes(bytes))
    }

    async fn fetch_local_key(&self, auth: &ApiAuth) -> Result<KeyMaterial, ApiError> {
        let mut state = self.state.lock();
        state.calls.push("fetch_local_key");
        let _ = authenticate(&state, auth)?;
        state
            .local_keys
            .get(auth.uid())
            .map(|bytes| KeyMaterial::from_bytes(*bytes))
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: "no local key".into(),
            })
    }
}
