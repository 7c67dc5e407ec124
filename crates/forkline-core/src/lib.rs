//! # forkline-core
//!
//! Foundation types shared by every forkline crate:
//! - [`apps`]: first-party applications, their client identifiers and URLs
//! - [`env`]: the injected browser environment (navigation, storage, clock)
//! - [`errors`]: API and fork error taxonomy
//! - [`ids`]: branded string identifiers
//! - [`security`]: secret-bearing wrappers with redacted `Debug`

#![deny(unsafe_code)]

pub mod apps;
pub mod env;
pub mod errors;
pub mod ids;
pub mod security;

pub use apps::{App, AppUrls, ForkType, SsoPaths};
pub use env::{ForkEnvironment, MemoryEnvironment};
pub use errors::{ApiError, ForkError};
pub use ids::{ForkAttemptId, ForkSelector, SessionId};
pub use security::{ApiAuth, KeyPassword, SessionTokens};
