//! # forkline-session
//!
//! The fork protocol proper.
//!
//! 1. The requesting app calls [`producer::request_fork`], which records the
//!    return URL in the tab's [`store::ForkStateStore`] and sends the user to
//!    the account app.
//! 2. The account app calls [`producer::produce_fork`]: it seals the key
//!    password under a fresh fork key, registers a grant and redirects to the
//!    target app's landing with everything in the URL fragment.
//! 3. The target app parses the landing with
//!    [`params::ConsumeForkParameters`] and hands it to
//!    [`consumer::ForkConsumer::consume_fork`], which redeems the selector and
//!    reconciles with any session already persisted on the device.

#![deny(unsafe_code)]

pub mod api;
pub mod consumer;
pub mod mock;
pub mod params;
pub mod persisted;
pub mod producer;
pub mod store;
pub mod validation;

pub use api::{ForkGrant, ForkGrantRequest, RedeemedFork, RevokeRequest, SessionApi, User};
pub use consumer::{ConsumedForkResult, ForkConsumer, ForkObserver, NoopObserver, SessionSource};
pub use params::{
    remove_hash_parameters, AuthorizeQuery, ConsumeForkParameters, LandingFragment,
    ProduceForkParameters, DEFAULT_STATE_MAX_LEN,
};
pub use persisted::{
    ActiveSession, DurableSessionStore, NoPersistence, ResumeError, SessionPersistence,
};
pub use producer::{
    generate_state, produce_fork, produce_oauth_fork, request_fork, OAuthProduceForkParameters,
    ProduceForkArgs,
};
pub use store::{ForkState, ForkStateStore};
