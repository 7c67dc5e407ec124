//! Fork producer, run by the source application.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tracing::{debug, info, instrument};

use forkline_core::apps::{App, AppUrls, ForkType};
use forkline_core::env::ForkEnvironment;
use forkline_core::errors::ForkError;
use forkline_core::security::{ApiAuth, KeyPassword};
use forkline_crypto::{seal, ForkBlob, ForkKey};

use crate::api::{ForkGrantRequest, SessionApi};
use crate::params::{AuthorizeQuery, LandingFragment};
use crate::store::{ForkState, ForkStateStore};

const STATE_BYTES: usize = 32;

/// Random state token: 32 bytes, base64url without padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Ask the account app to fork a session back to `from_app`.
///
/// Records where to return in the tab's fork-state store, then navigates to
/// the account app's authorize endpoint. An account switch returns to the
/// app's root instead of the current page. Returns the state token.
#[instrument(skip(env, urls))]
pub fn request_fork(
    env: &dyn ForkEnvironment,
    urls: &AppUrls,
    from_app: App,
    local_id: Option<u32>,
    fork_type: Option<ForkType>,
) -> String {
    let state = generate_state();
    let origin_url = match fork_type {
        Some(ForkType::Switch) => urls.href("/", from_app),
        _ => env.current_url(),
    };
    ForkStateStore::new(env).put(&ForkState {
        token: state.clone(),
        origin_url,
    });

    let query = AuthorizeQuery {
        app: from_app,
        state: state.clone(),
        local_id,
        fork_type,
        plan: None,
    }
    .to_query_string();
    let target = urls.href(&format!("{}?{query}", urls.paths.authorize), App::Account);
    debug!(target = %target, "requesting fork");
    env.navigate(&target);
    state
}

/// Everything the source application decides about one fork.
#[derive(Debug)]
pub struct ProduceForkArgs {
    pub app: App,
    /// State token received from the requesting app, echoed back verbatim.
    pub state: String,
    pub key_password: Option<KeyPassword>,
    pub persistent: bool,
    pub trusted: bool,
    pub fork_type: Option<ForkType>,
}

/// Mint a fork grant for `args.app` and navigate to its landing.
///
/// The landing carries the selector, the state token and the flags in the
/// fragment. The fork key travels with it only when a secret was sealed.
/// Grant registration failures propagate unchanged and nothing is navigated.
#[instrument(skip(api, env, urls, auth, args), fields(app = %args.app))]
pub async fn produce_fork(
    api: &dyn SessionApi,
    env: &dyn ForkEnvironment,
    urls: &AppUrls,
    auth: &ApiAuth,
    args: ProduceForkArgs,
) -> Result<String, ForkError> {
    let key = ForkKey::generate();
    let payload = match &args.key_password {
        Some(password) => {
            let blob_key = key.blob_key().map_err(|e| ForkError::Codec(e.to_string()))?;
            let sealed = seal(&blob_key, &ForkBlob::with_key_password(password.clone()))
                .map_err(|e| ForkError::Codec(e.to_string()))?;
            Some(sealed)
        }
        None => None,
    };
    let has_payload = payload.is_some();

    let grant = api
        .register_fork_grant(
            auth,
            ForkGrantRequest {
                child_client_id: args.app.client_id().to_string(),
                payload,
                independent: false,
            },
        )
        .await?;

    let fragment = LandingFragment {
        selector: &grant.selector,
        state: &args.state,
        key: has_payload.then_some(&key),
        persistent: args.persistent,
        trusted: args.trusted,
        fork_type: args.fork_type,
    }
    .encode();
    let target = urls.href(&format!("{}#{fragment}", urls.paths.fork), args.app);

    info!(
        has_payload,
        persistent = args.persistent,
        trusted = args.trusted,
        "redirecting to fork landing"
    );
    env.navigate(&target);
    Ok(target)
}

/// Identifies a pending OAuth authorization for a third-party client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthProduceForkParameters {
    pub client_id: String,
    pub oa_session: String,
}

/// Fork into a third-party OAuth client and navigate to the redirect URI the
/// session API hands back.
#[instrument(skip(api, env, auth), fields(client_id = %params.client_id))]
pub async fn produce_oauth_fork(
    api: &dyn SessionApi,
    env: &dyn ForkEnvironment,
    auth: &ApiAuth,
    params: &OAuthProduceForkParameters,
) -> Result<String, ForkError> {
    let redirect_uri = api
        .post_oauth_fork(auth, &params.client_id, &params.oa_session)
        .await?;
    env.navigate(&redirect_uri);
    Ok(redirect_uri)
}
