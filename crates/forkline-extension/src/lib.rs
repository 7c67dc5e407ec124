//! # forkline-extension
//!
//! Forks a session into a browser extension instead of a web app. The
//! extension receives the selector and key password directly, so no landing
//! URL is involved.
//!
//! - [`channel`]: native messaging and window-message transports
//! - [`messages`]: the `fork` request and the extension's reply
//! - [`bridge`]: the race between the transports and the timeout

#![deny(unsafe_code)]

pub mod bridge;
pub mod channel;
pub mod messages;

pub use bridge::{ExtensionBridge, DEFAULT_FALLBACK_TARGET, DEFAULT_TIMEOUT};
pub use channel::{
    MemoryWindow, NativeChannel, NativeSendError, NoNativeChannel, WindowChannel, WindowEvent,
    WindowSubscription,
};
pub use messages::{
    Extension, ExtensionForkPayload, ExtensionForkResult, ExtensionForkResultPayload,
    ExtensionForkResultType,
};
