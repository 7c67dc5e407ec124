/// Errors surfaced by the session API collaborator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("server error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized(body),
            _ => Self::Status { status, body },
        }
    }

    /// The credentials used for the call are dead (expired or revoked).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Errors surfaced to the host application by fork producers and consumers.
///
/// Nothing in this subsystem retries: unrecoverable variants abort the
/// in-progress sign-in transfer, and API errors propagate unchanged.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ForkError {
    /// The fork landing can not be completed; the user must restart from the
    /// source application.
    #[error("invalid fork consume: {0}")]
    InvalidForkConsume(String),

    /// The transferred payload failed authentication or could not be parsed.
    #[error("failed to decrypt fork payload: {0}")]
    PayloadDecrypt(String),

    /// Sealing the outgoing payload failed.
    #[error("failed to seal fork payload: {0}")]
    Codec(String),

    #[error("invalid fork parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ForkError {
    /// Errors the user can only recover from by restarting the flow.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::InvalidForkConsume(_) | Self::PayloadDecrypt(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidForkConsume(_) => "invalid_fork_consume",
            Self::PayloadDecrypt(_) => "payload_decrypt_failed",
            Self::Codec(_) => "codec",
            Self::InvalidParameters(_) => "invalid_parameters",
            Self::Api(_) => "api",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn from_status_mapping() {
        assert!(ApiError::from_status(401, "expired".into()).is_unauthorized());
        assert_matches!(
            ApiError::from_status(422, "selector used".into()),
            ApiError::Status { status: 422, .. }
        );
        assert!(!ApiError::from_status(500, "boom".into()).is_unauthorized());
    }

    #[test]
    fn unrecoverable_classification() {
        assert!(ForkError::InvalidForkConsume("missing state".into()).is_unrecoverable());
        assert!(ForkError::PayloadDecrypt("tag".into()).is_unrecoverable());
        assert!(!ForkError::Api(ApiError::Network("tcp".into())).is_unrecoverable());
        assert!(!ForkError::Codec("seal".into()).is_unrecoverable());
    }

    #[test]
    fn api_error_is_transparent() {
        let err = ForkError::from(ApiError::Status {
            status: 422,
            body: "grant expired".into(),
        });
        assert_eq!(err.to_string(), "server error 422: grant expired");
        assert_eq!(err.error_kind(), "api");
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(
            ForkError::PayloadDecrypt("x".into()).error_kind(),
            "payload_decrypt_failed"
        );
        assert_eq!(
            ForkError::InvalidForkConsume("x".into()).error_kind(),
            "invalid_fork_consume"
        );
    }
}
