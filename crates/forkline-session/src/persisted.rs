//! Persisted sessions and their reconciliation with a fresh fork.
//!
//! A device keeps at most one persisted session per local index. The record
//! lives in durable storage under `ps<local_id>`; the key password inside it
//! is sealed under a server-held local key so the record alone unlocks
//! nothing.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::zeroize::Zeroize;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use forkline_core::env::ForkEnvironment;
use forkline_core::errors::{ApiError, ForkError};
use forkline_core::ids::SessionId;
use forkline_core::security::{ApiAuth, KeyPassword, SessionTokens};
use forkline_crypto::{open, seal, EncryptedForkPayload, ForkBlob};

use crate::api::{SessionApi, User};

const RECORD_PREFIX: &str = "ps";
const RECORD_VERSION: u32 = 1;

/// An established session on this device.
#[derive(Clone, Debug)]
pub struct ActiveSession {
    pub uid: SessionId,
    pub tokens: SessionTokens,
    pub local_id: u32,
    pub key_password: Option<KeyPassword>,
    pub persistent: bool,
    pub trusted: bool,
    pub user: User,
}

impl ActiveSession {
    pub fn auth(&self) -> ApiAuth {
        ApiAuth::bearer(self.uid.clone(), self.tokens.access_token.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// No usable session is persisted for the index. Selects the fresh-session
    /// branch of a fork consume and never leaves it.
    #[error("invalid persistent session: {0}")]
    InvalidPersistentSession(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn resume(&self, local_id: u32) -> Result<ActiveSession, ResumeError>;
    async fn persist(&self, session: &ActiveSession) -> Result<(), ForkError>;
}

/// Persistence disabled: nothing resumes and nothing is written.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPersistence;

#[async_trait]
impl SessionPersistence for NoPersistence {
    async fn resume(&self, _local_id: u32) -> Result<ActiveSession, ResumeError> {
        Err(ResumeError::InvalidPersistentSession(
            "session persistence disabled".into(),
        ))
    }

    async fn persist(&self, _session: &ActiveSession) -> Result<(), ForkError> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord {
    version: u32,
    uid: String,
    local_id: u32,
    access_token: String,
    refresh_token: String,
    persistent: bool,
    trusted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blob: Option<EncryptedForkPayload>,
    persisted_at: i64,
}

impl Drop for PersistedRecord {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

/// [`SessionPersistence`] over the environment's durable storage.
pub struct DurableSessionStore {
    api: Arc<dyn SessionApi>,
    env: Arc<dyn ForkEnvironment>,
}

impl DurableSessionStore {
    pub fn new(api: Arc<dyn SessionApi>, env: Arc<dyn ForkEnvironment>) -> Self {
        Self { api, env }
    }

    /// Drop the record for `local_id`, if any.
    pub fn forget(&self, local_id: u32) {
        self.env.remove_durable(&record_key(local_id));
    }

    fn load(&self, key: &str, local_id: u32) -> Result<PersistedRecord, ResumeError> {
        let raw = self.env.read_durable(key).ok_or_else(|| {
            ResumeError::InvalidPersistentSession(format!("no session persisted for {local_id}"))
        })?;
        let record: PersistedRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(local_id, error = %e, "discarding malformed persisted session");
                self.env.remove_durable(key);
                return Err(ResumeError::InvalidPersistentSession(format!(
                    "malformed record: {e}"
                )));
            }
        };
        if record.version > RECORD_VERSION || record.local_id != local_id {
            self.env.remove_durable(key);
            return Err(ResumeError::InvalidPersistentSession(format!(
                "record version {} for index {} does not match",
                record.version, record.local_id
            )));
        }
        Ok(record)
    }

    async fn unseal(
        &self,
        auth: &ApiAuth,
        key: &str,
        blob: &EncryptedForkPayload,
    ) -> Result<KeyPassword, ResumeError> {
        let local_key = self.api.fetch_local_key(auth).await.map_err(|e| {
            if e.is_unauthorized() {
                self.env.remove_durable(key);
                ResumeError::InvalidPersistentSession("local key rejected".into())
            } else {
                ResumeError::Api(e)
            }
        })?;
        let opened = local_key
            .blob_key()
            .and_then(|blob_key| open(&blob_key, blob))
            .ok()
            .and_then(|fork_blob| fork_blob.key_password);
        match opened {
            Some(password) => Ok(password),
            None => {
                self.env.remove_durable(key);
                Err(ResumeError::InvalidPersistentSession(
                    "persisted secret no longer opens".into(),
                ))
            }
        }
    }
}

fn record_key(local_id: u32) -> String {
    format!("{RECORD_PREFIX}{local_id}")
}

#[async_trait]
impl SessionPersistence for DurableSessionStore {
    async fn resume(&self, local_id: u32) -> Result<ActiveSession, ResumeError> {
        let key = record_key(local_id);
        let mut record = self.load(&key, local_id)?;

        let uid = SessionId::from_raw(std::mem::take(&mut record.uid));
        let tokens = SessionTokens::new(
            std::mem::take(&mut record.access_token),
            std::mem::take(&mut record.refresh_token),
        );
        let auth = ApiAuth::bearer(uid.clone(), tokens.access_token.clone());

        let user = match self.api.fetch_current_user(&auth).await {
            Ok(user) => user,
            Err(e) if e.is_unauthorized() => {
                info!(local_id, uid = %uid, "persisted session expired, removing");
                self.env.remove_durable(&key);
                return Err(ResumeError::InvalidPersistentSession(
                    "persisted session expired".into(),
                ));
            }
            Err(e) => return Err(ResumeError::Api(e)),
        };

        let key_password = match record.blob.take() {
            Some(blob) => Some(self.unseal(&auth, &key, &blob).await?),
            None => None,
        };

        debug!(local_id, uid = %uid, "resumed persisted session");
        Ok(ActiveSession {
            uid,
            tokens,
            local_id,
            key_password,
            persistent: record.persistent,
            trusted: record.trusted,
            user,
        })
    }

    async fn persist(&self, session: &ActiveSession) -> Result<(), ForkError> {
        let blob = match &session.key_password {
            Some(password) => {
                let local_key = self.api.register_local_key(&session.auth()).await?;
                let blob_key = local_key
                    .blob_key()
                    .map_err(|e| ForkError::Codec(e.to_string()))?;
                let sealed = seal(&blob_key, &ForkBlob::with_key_password(password.clone()))
                    .map_err(|e| ForkError::Codec(e.to_string()))?;
                Some(sealed)
            }
            None => None,
        };

        let record = PersistedRecord {
            version: RECORD_VERSION,
            uid: session.uid.as_str().to_string(),
            local_id: session.local_id,
            access_token: session.tokens.access_token.expose_secret().to_string(),
            refresh_token: session.tokens.refresh_token.expose_secret().to_string(),
            persistent: session.persistent,
            trusted: session.trusted,
            blob,
            persisted_at: self.env.now().timestamp_millis(),
        };
        let mut json =
            serde_json::to_string(&record).map_err(|e| ForkError::Codec(e.to_string()))?;
        self.env.write_durable(&record_key(session.local_id), &json);
        json.zeroize();

        info!(local_id = session.local_id, uid = %session.uid, "persisted session");
        Ok(())
    }
}
