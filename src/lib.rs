//! # forkline
//!
//! Host wiring: builds the fork collaborators from [`ForkSettings`] so an
//! embedding app does not have to read individual settings itself.

#![deny(unsafe_code)]

pub mod host;

pub use host::{extension_bridge, fork_consumer, persistence_for, produce_fork_args};
