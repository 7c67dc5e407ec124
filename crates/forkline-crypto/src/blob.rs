use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use forkline_core::security::KeyPassword;
use secrecy::zeroize::Zeroize;
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;
use crate::key::BlobKey;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Schema version written into every sealed blob.
///
/// Blobs without a `version` field predate versioning and are read as
/// version 0 with the same fields.
pub const BLOB_VERSION: u32 = 1;

/// Base64 of `nonce || ciphertext || tag`, as sent to and returned by the
/// session API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedForkPayload(String);

impl EncryptedForkPayload {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Secrets transferred alongside a fork.
#[derive(Clone, Debug, Default)]
pub struct ForkBlob {
    pub key_password: Option<KeyPassword>,
}

impl ForkBlob {
    pub fn with_key_password(password: KeyPassword) -> Self {
        Self {
            key_password: Some(password),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(default)]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_password: Option<String>,
}

impl Drop for WireBlob {
    fn drop(&mut self) {
        if let Some(pw) = self.key_password.as_mut() {
            pw.zeroize();
        }
    }
}

/// Seal `blob` under `key` with a fresh random nonce.
pub fn seal(key: &BlobKey, blob: &ForkBlob) -> Result<EncryptedForkPayload, CodecError> {
    let wire = WireBlob {
        version: BLOB_VERSION,
        key_password: blob.key_password.as_ref().map(|pw| pw.expose().to_string()),
    };
    let mut plaintext =
        serde_json::to_vec(&wire).map_err(|e| CodecError::Malformed(e.to_string()))?;
    drop(wire);

    let cipher = ChaCha20Poly1305::new(key.expose().into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    chacha20poly1305::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher.encrypt(nonce, plaintext.as_slice());
    plaintext.zeroize();
    let ciphertext = sealed.map_err(|_| CodecError::EncryptionFailed)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(EncryptedForkPayload(STANDARD.encode(&combined)))
}

/// Open a sealed blob. Fails closed on any tampering, truncation or key
/// mismatch.
pub fn open(key: &BlobKey, payload: &EncryptedForkPayload) -> Result<ForkBlob, CodecError> {
    let combined = STANDARD
        .decode(payload.as_str())
        .map_err(|_| CodecError::InvalidEncoding)?;

    if combined.len() < NONCE_LEN + TAG_LEN {
        return Err(CodecError::InvalidEncoding);
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = ChaCha20Poly1305::new(key.expose().into());

    let mut plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CodecError::DecryptionFailed)?;

    let parsed = serde_json::from_slice::<WireBlob>(&plaintext);
    plaintext.zeroize();
    let mut wire = parsed.map_err(|e| CodecError::Malformed(e.to_string()))?;

    if wire.version > BLOB_VERSION {
        return Err(CodecError::UnsupportedVersion(wire.version));
    }

    Ok(ForkBlob {
        key_password: wire.key_password.take().map(KeyPassword::new),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyMaterial;
    use assert_matches::assert_matches;

    fn blob_key() -> BlobKey {
        KeyMaterial::generate().blob_key().unwrap()
    }

    fn seal_raw(key: &BlobKey, json: &str) -> EncryptedForkPayload {
        let cipher = ChaCha20Poly1305::new(key.expose().into());
        let nonce_bytes = [5u8; NONCE_LEN];
        let ct = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), json.as_bytes())
            .unwrap();
        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ct);
        EncryptedForkPayload(STANDARD.encode(combined))
    }

    #[test]
    fn seal_open_preserves_key_password() {
        let key = blob_key();
        let sealed = seal(&key, &ForkBlob::with_key_password(KeyPassword::new("pw-123"))).unwrap();
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(opened.key_password.unwrap().expose(), "pw-123");
    }

    #[test]
    fn empty_blob_opens_empty() {
        let key = blob_key();
        let sealed = seal(&key, &ForkBlob::default()).unwrap();
        assert!(open(&key, &sealed).unwrap().key_password.is_none());
    }

    #[test]
    fn nonces_differ_per_seal() {
        let key = blob_key();
        let blob = ForkBlob::with_key_password(KeyPassword::new("same"));
        assert_ne!(seal(&key, &blob).unwrap(), seal(&key, &blob).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&blob_key(), &ForkBlob::with_key_password(KeyPassword::new("pw"))).unwrap();
        assert_matches!(open(&blob_key(), &sealed), Err(CodecError::DecryptionFailed));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = blob_key();
        let sealed = seal(&key, &ForkBlob::with_key_password(KeyPassword::new("pw"))).unwrap();
        let mut bytes = STANDARD.decode(sealed.as_str()).unwrap();
        if let Some(b) = bytes.last_mut() {
            *b ^= 0x01;
        }
        let tampered = EncryptedForkPayload(STANDARD.encode(bytes));
        assert_matches!(open(&key, &tampered), Err(CodecError::DecryptionFailed));
    }

    #[test]
    fn truncated_blob_fails() {
        let key = blob_key();
        let sealed = seal(&key, &ForkBlob::default()).unwrap();
        let bytes = STANDARD.decode(sealed.as_str()).unwrap();
        let truncated = EncryptedForkPayload(STANDARD.encode(&bytes[..NONCE_LEN + 4]));
        assert_matches!(open(&key, &truncated), Err(CodecError::InvalidEncoding));

        let cut_tag = EncryptedForkPayload(STANDARD.encode(&bytes[..bytes.len() - 1]));
        assert!(open(&key, &cut_tag).is_err());
    }

    #[test]
    fn non_base64_fails() {
        assert_matches!(
            open(&blob_key(), &EncryptedForkPayload::from_raw("%%%")),
            Err(CodecError::InvalidEncoding)
        );
    }

    #[test]
    fn unversioned_blob_read_as_legacy() {
        let key = blob_key();
        let sealed = seal_raw(&key, r#"{"keyPassword":"legacy-pw"}"#);
        assert_eq!(open(&key, &sealed).unwrap().key_password.unwrap().expose(), "legacy-pw");
    }

    #[test]
    fn newer_version_rejected() {
        let key = blob_key();
        let sealed = seal_raw(&key, r#"{"version":2,"keyPassword":"pw"}"#);
        assert_matches!(open(&key, &sealed), Err(CodecError::UnsupportedVersion(2)));
    }

    #[test]
    fn non_json_plaintext_is_malformed() {
        let key = blob_key();
        let sealed = seal_raw(&key, "not json");
        assert_matches!(open(&key, &sealed), Err(CodecError::Malformed(_)));
    }
}
