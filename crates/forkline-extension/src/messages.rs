//! Extension message contract.
//!
//! Outbound: `{type: "fork", payload: {selector, keyPassword?, persistent, trusted, state}}`.
//! Inbound: `{type: "success" | "error", payload?: {title?, message}}`.

use forkline_core::ids::ForkSelector;
use forkline_core::security::KeyPassword;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TIMED_OUT_MESSAGE: &str = "Extension timed out";

/// Identifies the target extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    pub id: String,
}

impl Extension {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// What the extension needs to adopt the session.
#[derive(Clone, Debug)]
pub struct ExtensionForkPayload {
    pub selector: ForkSelector,
    pub key_password: Option<KeyPassword>,
    pub persistent: bool,
    pub trusted: bool,
    pub state: String,
}

impl ExtensionForkPayload {
    /// The outbound `fork` message. Contains the key password in clear, so the
    /// returned value must only go to the extension.
    pub fn to_message(&self) -> Value {
        let mut payload = json!({
            "selector": self.selector.as_str(),
            "persistent": self.persistent,
            "trusted": self.trusted,
            "state": self.state,
        });
        if let Some(password) = &self.key_password {
            payload["keyPassword"] = Value::String(password.expose().to_string());
        }
        json!({ "type": "fork", "payload": payload })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionForkResultType {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionForkResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionForkResult {
    #[serde(rename = "type")]
    pub kind: ExtensionForkResultType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ExtensionForkResultPayload>,
}

impl ExtensionForkResult {
    pub fn success(payload: Option<ExtensionForkResultPayload>) -> Self {
        Self {
            kind: ExtensionForkResultType::Success,
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ExtensionForkResultType::Error,
            payload: Some(ExtensionForkResultPayload {
                title: None,
                message: message.into(),
            }),
        }
    }

    pub fn timed_out() -> Self {
        Self::error(TIMED_OUT_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        self.kind == ExtensionForkResultType::Success
    }

    /// Parse a reply from the extension. Malformed replies read as errors.
    pub fn from_reply(reply: Value) -> Self {
        serde_json::from_value(reply)
            .unwrap_or_else(|e| Self::error(format!("invalid extension reply: {e}")))
    }

    /// Parse an optional `payload` object carried by a window reply.
    pub(crate) fn payload_from(value: Option<&Value>) -> Option<ExtensionForkResultPayload> {
        value
            .cloned()
            .and_then(|v| serde_json::from_value::<ExtensionForkResultPayload>(v).ok())
    }
}
