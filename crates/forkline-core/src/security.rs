use secrecy::{ExposeSecret, SecretString};

use crate::ids::SessionId;

/// Password unlocking the user's private key material. Zeroized on drop,
/// redacted in Debug.
#[derive(Clone)]
pub struct KeyPassword(pub SecretString);

impl KeyPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(SecretString::from(password.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for KeyPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyPassword([REDACTED])")
    }
}

/// Access/refresh token pair for one session.
#[derive(Clone)]
pub struct SessionTokens {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionTokens([REDACTED])")
    }
}

/// How a session API call authenticates.
#[derive(Clone)]
pub enum ApiAuth {
    /// Cookie-backed session identified by UID only (the producing app).
    Uid(SessionId),
    /// Explicit bearer credentials (a freshly forked or resumed session).
    Bearer {
        uid: SessionId,
        access_token: SecretString,
    },
}

impl ApiAuth {
    pub fn bearer(uid: SessionId, access_token: SecretString) -> Self {
        Self::Bearer { uid, access_token }
    }

    pub fn uid(&self) -> &SessionId {
        match self {
            Self::Uid(uid) | Self::Bearer { uid, .. } => uid,
        }
    }
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uid(uid) => f.debug_tuple("Uid").field(uid).finish(),
            Self::Bearer { uid, .. } => f
                .debug_struct("Bearer")
                .field("uid", uid)
                .field("access_token", &"[REDACTED]")
                .finish(),
        }
    }
}
