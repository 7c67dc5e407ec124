use std::sync::Arc;

use forkline_core::env::ForkEnvironment;
use forkline_core::errors::ForkError;
use forkline_core::security::KeyPassword;
use forkline_extension::{ExtensionBridge, NativeChannel, WindowChannel};
use forkline_session::{
    DurableSessionStore, ForkConsumer, NoPersistence, ProduceForkArgs, ProduceForkParameters,
    SessionApi, SessionPersistence,
};
use forkline_settings::ForkSettings;
use tracing::debug;

/// Durable storage when `fork.persistSessions` is on, [`NoPersistence`]
/// otherwise.
pub fn persistence_for(
    settings: &ForkSettings,
    api: Arc<dyn SessionApi>,
    env: Arc<dyn ForkEnvironment>,
) -> Arc<dyn SessionPersistence> {
    if settings.fork.persist_sessions {
        Arc::new(DurableSessionStore::new(api, env))
    } else {
        debug!("session persistence disabled");
        Arc::new(NoPersistence)
    }
}

pub fn fork_consumer(
    settings: &ForkSettings,
    api: Arc<dyn SessionApi>,
    env: Arc<dyn ForkEnvironment>,
) -> ForkConsumer {
    let persistence = persistence_for(settings, api.clone(), env.clone());
    ForkConsumer::new(api, env, persistence)
}

pub fn extension_bridge(
    settings: &ForkSettings,
    native: Arc<dyn NativeChannel>,
    window: Arc<dyn WindowChannel>,
) -> ExtensionBridge {
    ExtensionBridge::new(native, window)
        .with_timeout(settings.extension_timeout())
        .with_fallback_target(settings.extension.fallback_target.clone())
}

/// Producer arguments for a parsed authorize request.
///
/// `persistent` and `trusted` start from `fork.defaultPersistent` and
/// `fork.defaultTrusted`; callers overwrite them with the user's choice when
/// the login form asked.
pub fn produce_fork_args(
    settings: &ForkSettings,
    params: ProduceForkParameters,
    key_password: Option<KeyPassword>,
) -> Result<ProduceForkArgs, ForkError> {
    let app = params
        .app
        .ok_or_else(|| ForkError::InvalidParameters("authorize request names no app".into()))?;
    Ok(ProduceForkArgs {
        app,
        state: params.state,
        key_password,
        persistent: settings.fork.default_persistent,
        trusted: settings.fork.default_trusted,
        fork_type: params.fork_type,
    })
}
