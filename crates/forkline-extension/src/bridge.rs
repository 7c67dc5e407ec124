use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::channel::{NativeChannel, NativeSendError, WindowChannel};
use crate::messages::{Extension, ExtensionForkPayload, ExtensionForkResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_FALLBACK_TARGET: &str = "/";

/// Hands a fork to a browser extension.
///
/// Native messaging is tried first. When the browser has none, the fork is
/// posted as a window message and the first correlated reply is taken. A
/// timer races both; whichever settles first decides the result and the
/// others are dropped, which unregisters the window listener.
pub struct ExtensionBridge {
    native: Arc<dyn NativeChannel>,
    window: Arc<dyn WindowChannel>,
    timeout: Duration,
    fallback_target: String,
}

impl ExtensionBridge {
    pub fn new(native: Arc<dyn NativeChannel>, window: Arc<dyn WindowChannel>) -> Self {
        Self {
            native,
            window,
            timeout: DEFAULT_TIMEOUT,
            fallback_target: DEFAULT_FALLBACK_TARGET.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback_target(mut self, target: impl Into<String>) -> Self {
        self.fallback_target = target.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves exactly once. Never fails: transport problems and the timeout
    /// both come back as an `error` result.
    #[instrument(skip(self, payload), fields(extension_id = %extension.id))]
    pub async fn produce_extension_fork(
        &self,
        extension: &Extension,
        payload: &ExtensionForkPayload,
    ) -> ExtensionForkResult {
        let message = payload.to_message();
        let (use_fallback, fallback_requested) = oneshot::channel::<()>();

        let native = {
            let message = message.clone();
            async move {
                match self.native.send_message(&extension.id, message).await {
                    Ok(reply) => ExtensionForkResult::from_reply(reply),
                    Err(NativeSendError::Runtime(msg)) => ExtensionForkResult::error(msg),
                    Err(NativeSendError::Unavailable) => {
                        debug!("native messaging unavailable, using window messages");
                        let _ = use_fallback.send(());
                        pending().await
                    }
                }
            }
        };

        let fallback = async {
            if fallback_requested.await.is_err() {
                return pending().await;
            }
            self.window_fork(extension, &message).await
        };

        tokio::select! {
            result = native => result,
            result = fallback => result,
            () = tokio::time::sleep(self.timeout) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "extension fork timed out");
                ExtensionForkResult::timed_out()
            }
        }
    }

    async fn window_fork(&self, extension: &Extension, message: &Value) -> ExtensionForkResult {
        // Listen before posting so an immediate reply is not missed.
        let mut subscription = self.window.subscribe();

        let mut outbound = message.clone();
        outbound["extension"] = Value::String(extension.id.clone());
        self.window.post_message(outbound, &self.fallback_target);

        while let Some(event) = subscription.recv().await {
            if !event.from_self {
                continue;
            }
            let reply = event.data.get("payload");
            match event.data.get("fork").and_then(Value::as_str) {
                Some("success") => {
                    return ExtensionForkResult::success(ExtensionForkResult::payload_from(reply))
                }
                Some("error") => {
                    let message = ExtensionForkResult::payload_from(reply)
                        .map(|p| p.message)
                        .unwrap_or_else(|| "Extension rejected the fork".to_string());
                    return ExtensionForkResult::error(message);
                }
                _ => {}
            }
        }
        // Listener closed without a reply; leave it to the timer.
        pending().await
    }
}
