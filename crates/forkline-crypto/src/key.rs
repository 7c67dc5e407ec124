use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use secrecy::zeroize::Zeroize;
use secrecy::{ExposeSecret, SecretBox};
use sha2::Sha256;

use crate::errors::CodecError;

pub const KEY_LEN: usize = 32;

const BLOB_KEY_INFO: &[u8] = b"forkline/fork-blob/v1";

/// 32 bytes of random key material.
///
/// Used for the per-attempt fork key (carried only in the landing URL
/// fragment) and for the per-session local key that seals persisted secrets.
pub struct KeyMaterial(SecretBox<[u8; KEY_LEN]>);

/// The random key generated for each fork attempt.
pub type ForkKey = KeyMaterial;

impl KeyMaterial {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(mut bytes: [u8; KEY_LEN]) -> Self {
        let key = Self(SecretBox::new(Box::new(bytes)));
        bytes.zeroize();
        key
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let array: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidKeyLength(bytes.len()))?;
        Ok(Self::from_bytes(array))
    }

    /// Decode base64url (padding tolerated) into exactly [`KEY_LEN`] bytes.
    pub fn from_base64url(encoded: &str) -> Result<Self, CodecError> {
        let mut bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|_| CodecError::InvalidEncoding)?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.expose_secret())
    }

    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.0.expose_secret()
    }

    /// Derive the symmetric key that seals fork payloads.
    pub fn blob_key(&self) -> Result<BlobKey, CodecError> {
        let hkdf = Hkdf::<Sha256>::new(None, self.0.expose_secret());
        let mut okm = [0u8; KEY_LEN];
        hkdf.expand(BLOB_KEY_INFO, &mut okm)
            .map_err(|_| CodecError::KeyDerivation)?;
        let key = BlobKey(SecretBox::new(Box::new(okm)));
        okm.zeroize();
        Ok(key)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Derived ChaCha20-Poly1305 key.
pub struct BlobKey(SecretBox<[u8; KEY_LEN]>);

impl BlobKey {
    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlobKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn generated_keys_differ() {
        let a = KeyMaterial::generate();
        let b = KeyMaterial::generate();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn base64url_is_43_chars_without_padding() {
        let key = KeyMaterial::generate();
        let encoded = key.to_base64url();
        assert_eq!(encoded.len(), 43);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        let decoded = KeyMaterial::from_base64url(&encoded).unwrap();
        assert_eq!(decoded.expose(), key.expose());
    }

    #[test]
    fn padded_input_accepted() {
        let key = KeyMaterial::from_bytes([7u8; KEY_LEN]);
        let padded = format!("{}=", key.to_base64url());
        assert_eq!(KeyMaterial::from_base64url(&padded).unwrap().expose(), key.expose());
    }

    #[test]
    fn wrong_length_rejected() {
        let short = URL_SAFE_NO_PAD.encode([1u8; 16]);
        assert_matches!(
            KeyMaterial::from_base64url(&short),
            Err(CodecError::InvalidKeyLength(16))
        );
    }

    #[test]
    fn garbage_rejected() {
        assert_matches!(
            KeyMaterial::from_base64url("not base64!!"),
            Err(CodecError::InvalidEncoding)
        );
    }

    #[test]
    fn blob_key_is_deterministic_and_distinct_from_input() {
        let key = KeyMaterial::from_bytes([3u8; KEY_LEN]);
        let a = key.blob_key().unwrap();
        let b = key.blob_key().unwrap();
        assert_eq!(a.expose(), b.expose());
        assert_ne!(a.expose(), key.expose());
    }

    #[test]
    fn debug_redacted() {
        let key = KeyMaterial::from_bytes([9u8; KEY_LEN]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&key.to_base64url()));
    }
}
