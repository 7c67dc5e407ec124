//! Transports to the extension.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum NativeSendError {
    /// The browser exposes no native messaging to this page.
    #[error("native extension messaging unavailable")]
    Unavailable,
    /// The runtime reported an error for the call.
    #[error("{0}")]
    Runtime(String),
}

/// Direct cross-context messaging to an extension by id.
#[async_trait]
pub trait NativeChannel: Send + Sync {
    async fn send_message(&self, extension_id: &str, message: Value) -> Result<Value, NativeSendError>;
}

/// A native channel for browsers without one.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNativeChannel;

#[async_trait]
impl NativeChannel for NoNativeChannel {
    async fn send_message(&self, _extension_id: &str, _message: Value) -> Result<Value, NativeSendError> {
        Err(NativeSendError::Unavailable)
    }
}

/// A message observed on the page's window.
#[derive(Clone, Debug)]
pub struct WindowEvent {
    /// The message was posted by this window rather than a frame or opener.
    pub from_self: bool,
    pub data: Value,
}

/// `window.postMessage` plus message listeners.
pub trait WindowChannel: Send + Sync {
    fn post_message(&self, message: Value, target_origin: &str);

    /// Register a listener; it stays registered until the returned
    /// subscription is dropped.
    fn subscribe(&self) -> WindowSubscription;
}

/// A registered window message listener.
pub struct WindowSubscription {
    events: mpsc::UnboundedReceiver<WindowEvent>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl WindowSubscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<WindowEvent>,
        unregister: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            on_drop: Some(Box::new(unregister)),
        }
    }

    pub async fn recv(&mut self) -> Option<WindowEvent> {
        self.events.recv().await
    }
}

impl Drop for WindowSubscription {
    fn drop(&mut self) {
        if let Some(unregister) = self.on_drop.take() {
            unregister();
        }
    }
}

#[derive(Default)]
struct WindowState {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<WindowEvent>>,
    posted: Vec<(Value, String)>,
}

/// In-process window. Posted messages are echoed to every listener the way a
/// browser delivers a window's own messages back to it.
#[derive(Clone, Default)]
pub struct MemoryWindow {
    inner: Arc<Mutex<WindowState>>,
}

impl MemoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every registered listener.
    pub fn dispatch(&self, event: WindowEvent) {
        let state = self.inner.lock();
        for listener in state.listeners.values() {
            let _ = listener.send(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn posted(&self) -> Vec<(Value, String)> {
        self.inner.lock().posted.clone()
    }
}

impl WindowChannel for MemoryWindow {
    fn post_message(&self, message: Value, target_origin: &str) {
        self.inner
            .lock()
            .posted
            .push((message.clone(), target_origin.to_string()));
        self.dispatch(WindowEvent {
            from_self: true,
            data: message,
        });
    }

    fn subscribe(&self) -> WindowSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.inner.lock();
            let id = state.next_id;
            state.next_id += 1;
            let _ = state.listeners.insert(id, tx);
            id
        };
        let inner = Arc::clone(&self.inner);
        WindowSubscription::new(rx, move || {
            let _ = inner.lock().listeners.remove(&id);
        })
    }
}
