#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid encoding")]
    InvalidEncoding,
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed payload: {0}")]
    Malformed(String),
}
