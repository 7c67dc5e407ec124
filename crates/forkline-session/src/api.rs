//! The session API collaborator, as seen by the fork protocol.
//!
//! Real deployments implement [`SessionApi`] over their HTTP client; tests use
//! [`crate::mock::MockSessionApi`].

use async_trait::async_trait;
use forkline_core::errors::ApiError;
use forkline_core::ids::{ForkSelector, SessionId};
use forkline_core::security::{ApiAuth, SessionTokens};
use forkline_crypto::{EncryptedForkPayload, KeyMaterial};
use serde::{Deserialize, Serialize};

/// Request to register a fork grant for a child application.
#[derive(Clone, Debug)]
pub struct ForkGrantRequest {
    pub child_client_id: String,
    pub payload: Option<EncryptedForkPayload>,
    /// Whether the child session is fully separate from the parent. Browser
    /// forks always create dependent child sessions.
    pub independent: bool,
}

#[derive(Clone, Debug)]
pub struct ForkGrant {
    pub selector: ForkSelector,
}

/// Credentials minted by redeeming a selector.
#[derive(Debug)]
pub struct RedeemedFork {
    pub uid: SessionId,
    pub tokens: SessionTokens,
    pub payload: Option<EncryptedForkPayload>,
    pub local_id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevokeRequest {
    /// Revoke only the child session the credentials belong to.
    pub child: bool,
}

/// The authenticated user's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn register_fork_grant(
        &self,
        auth: &ApiAuth,
        request: ForkGrantRequest,
    ) -> Result<ForkGrant, ApiError>;

    /// Exchange a selector for session credentials. Single use: a second
    /// redemption of the same selector fails upstream.
    async fn redeem_fork_selector(&self, selector: &ForkSelector) -> Result<RedeemedFork, ApiError>;

    async fn revoke_session(&self, auth: &ApiAuth, request: RevokeRequest) -> Result<(), ApiError>;

    async fn fetch_current_user(&self, auth: &ApiAuth) -> Result<User, ApiError>;

    /// Start an OAuth fork toward a third-party client; returns the redirect URI.
    async fn post_oauth_fork(
        &self,
        auth: &ApiAuth,
        client_id: &str,
        oa_session: &str,
    ) -> Result<String, ApiError>;

    /// Issue a fresh server-held key that seals this session's persisted secrets.
    async fn register_local_key(&self, auth: &ApiAuth) -> Result<KeyMaterial, ApiError>;

    /// Fetch the key previously issued by [`SessionApi::register_local_key`].
    async fn fetch_local_key(&self, auth: &ApiAuth) -> Result<KeyMaterial, ApiError>;
}
