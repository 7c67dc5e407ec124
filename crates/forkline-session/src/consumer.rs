//! Fork consumer, run by the target application on the fork landing.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use forkline_core::env::ForkEnvironment;
use forkline_core::errors::{ApiError, ForkError};
use forkline_core::ids::{ForkAttemptId, SessionId};
use forkline_core::security::{ApiAuth, KeyPassword};
use forkline_crypto::{open, EncryptedForkPayload, ForkKey};

use crate::api::{RedeemedFork, RevokeRequest, SessionApi};
use crate::params::ConsumeForkParameters;
use crate::persisted::{ActiveSession, ResumeError, SessionPersistence};
use crate::store::ForkStateStore;

/// Callbacks for outcomes that are handled internally but worth surfacing.
pub trait ForkObserver: Send + Sync {
    /// Revoking the redundant forked session failed. The consume still
    /// succeeded with the resumed session.
    fn on_revoke_failed(&self, uid: &SessionId, error: &ApiError);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ForkObserver for NoopObserver {
    fn on_revoke_failed(&self, _uid: &SessionId, _error: &ApiError) {}
}

/// Where the returned session came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSource {
    /// A session already persisted on this device for the same local index.
    /// The forked session was discarded.
    Resumed,
    /// The session minted by the fork.
    Forked,
}

#[derive(Debug)]
pub struct ConsumedForkResult {
    pub session: ActiveSession,
    /// Path, query and fragment of the page the fork was requested from.
    pub path_to_restore: String,
    pub source: SessionSource,
}

pub struct ForkConsumer {
    api: Arc<dyn SessionApi>,
    env: Arc<dyn ForkEnvironment>,
    persistence: Arc<dyn SessionPersistence>,
    observer: Arc<dyn ForkObserver>,
}

impl ForkConsumer {
    pub fn new(
        api: Arc<dyn SessionApi>,
        env: Arc<dyn ForkEnvironment>,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Self {
        Self {
            api,
            env,
            persistence,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ForkObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Complete one fork landing.
    ///
    /// Taking `params` by value means a parsed landing is spent by the call.
    /// The state entry is removed on lookup, so replaying the same landing in
    /// this tab fails with [`ForkError::InvalidForkConsume`] before any API
    /// call is made.
    #[instrument(skip(self, params), fields(attempt = %ForkAttemptId::new()))]
    pub async fn consume_fork(
        &self,
        params: ConsumeForkParameters,
    ) -> Result<ConsumedForkResult, ForkError> {
        let path_to_restore = self.lookup_origin(&params.state)?;

        let redeemed = self.api.redeem_fork_selector(&params.selector).await?;
        let forked_auth = ApiAuth::bearer(redeemed.uid.clone(), redeemed.tokens.access_token.clone());

        match self.persistence.resume(redeemed.local_id).await {
            Ok(session) => {
                self.revoke_redundant(&forked_auth).await;
                info!(
                    local_id = session.local_id,
                    uid = %session.uid,
                    "resumed persisted session, forked session discarded"
                );
                return Ok(ConsumedForkResult {
                    session,
                    path_to_restore,
                    source: SessionSource::Resumed,
                });
            }
            Err(ResumeError::InvalidPersistentSession(reason)) => {
                debug!(local_id = redeemed.local_id, reason = %reason, "completing fresh fork");
            }
            Err(ResumeError::Api(e)) => return Err(e.into()),
        }

        let RedeemedFork {
            uid,
            tokens,
            payload,
            local_id,
        } = redeemed;
        let key_password = open_payload(payload.as_ref(), params.key.as_ref())?;
        let user = self.api.fetch_current_user(&forked_auth).await?;

        let session = ActiveSession {
            uid,
            tokens,
            local_id,
            key_password,
            persistent: params.persistent,
            trusted: params.trusted,
            user,
        };
        self.persistence.persist(&session).await?;

        info!(local_id, uid = %session.uid, "fork consumed");
        Ok(ConsumedForkResult {
            session,
            path_to_restore,
            source: SessionSource::Forked,
        })
    }

    fn lookup_origin(&self, state: &str) -> Result<String, ForkError> {
        let fork_state = ForkStateStore::new(self.env.as_ref())
            .take(state)
            .ok_or_else(|| ForkError::InvalidForkConsume(format!("missing state {state}")))?;
        if fork_state.origin_url.is_empty() {
            return Err(ForkError::InvalidForkConsume("missing url".into()));
        }
        let url = Url::parse(&fork_state.origin_url)
            .map_err(|e| ForkError::InvalidForkConsume(format!("invalid stored url: {e}")))?;

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            path.push('#');
            path.push_str(fragment);
        }
        Ok(path)
    }

    async fn revoke_redundant(&self, forked_auth: &ApiAuth) {
        if let Err(error) = self
            .api
            .revoke_session(forked_auth, RevokeRequest { child: true })
            .await
        {
            warn!(
                target: "forkline::revoke",
                uid = %forked_auth.uid(),
                error = %error,
                "failed to revoke discarded forked session"
            );
            self.observer.on_revoke_failed(forked_auth.uid(), &error);
        }
    }
}

fn open_payload(
    payload: Option<&EncryptedForkPayload>,
    key: Option<&ForkKey>,
) -> Result<Option<KeyPassword>, ForkError> {
    let Some(payload) = payload else {
        return Ok(None);
    };
    let key = key.ok_or_else(|| ForkError::PayloadDecrypt("missing fork key".into()))?;
    let blob = key
        .blob_key()
        .and_then(|blob_key| open(&blob_key, payload))
        .map_err(|e| ForkError::PayloadDecrypt(e.to_string()))?;
    Ok(blob.key_password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkline_crypto::{seal, ForkBlob};

    fn sealed(key: &ForkKey, password: &str) -> EncryptedForkPayload {
        let blob_key = key.blob_key().unwrap();
        seal(&blob_key, &ForkBlob::with_key_password(KeyPassword::new(password))).unwrap()
    }

    #[test]
    fn no_payload_needs_no_key() {
        assert!(open_payload(None, None).unwrap().is_none());
    }

    #[test]
    fn payload_opens_with_its_key() {
        let key = ForkKey::generate();
        let payload = sealed(&key, "pw");
        let password = open_payload(Some(&payload), Some(&key)).unwrap().unwrap();
        assert_eq!(password.expose(), "pw");
    }

    #[test]
    fn payload_without_key_fails_decrypt() {
        let key = ForkKey::generate();
        let payload = sealed(&key, "pw");
        assert!(matches!(
            open_payload(Some(&payload), None),
            Err(ForkError::PayloadDecrypt(_))
        ));
    }

    #[test]
    fn payload_with_wrong_key_fails_decrypt() {
        let payload = sealed(&ForkKey::generate(), "pw");
        let err = open_payload(Some(&payload), Some(&ForkKey::generate())).unwrap_err();
        assert!(err.is_unrecoverable());
        assert_eq!(err.error_kind(), "payload_decrypt_failed");
    }
}
