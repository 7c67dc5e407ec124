//! # forkline-crypto
//!
//! Key material carried in fork landings and the sealed payload that
//! transfers the key password between applications.
//!
//! The payload is a versioned JSON object sealed with ChaCha20-Poly1305 under
//! a key derived (HKDF-SHA256) from the random fork key. Opening fails closed
//! on a wrong key, a flipped bit or a truncated blob.

#![deny(unsafe_code)]

pub mod blob;
pub mod errors;
pub mod key;

pub use blob::{open, seal, EncryptedForkPayload, ForkBlob, BLOB_VERSION};
pub use errors::CodecError;
pub use key::{BlobKey, ForkKey, KeyMaterial, KEY_LEN};
