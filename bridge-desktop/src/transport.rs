//! In-process method transport.
//!
//! [`LoopbackTransport`] records every outbound call and answers
//! `invoke_with_result` from a table of scripted replies. It stands in for a
//! real cross-context channel when the background handler lives in the same
//! process, and lets tests observe exactly what the core sent.

use std::collections::HashMap;

use async_trait::async_trait;
use bridge_traits::{
    channel::{MethodCall, MethodTransport},
    error::{BridgeError, Result},
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

enum Reply {
    Value(Value),
    Error(String),
}

pub struct LoopbackTransport {
    name: String,
    calls: Mutex<Vec<MethodCall>>,
    replies: Mutex<HashMap<String, Reply>>,
    sender: mpsc::UnboundedSender<MethodCall>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<MethodCall>>,
}

impl LoopbackTransport {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    /// Answers every later `method` call with `value`.
    pub fn reply_with(&self, method: &str, value: Value) {
        self.replies
            .lock()
            .insert(method.to_string(), Reply::Value(value));
    }

    /// Fails every later `method` call with a remote error.
    pub fn fail_with(&self, method: &str, message: impl Into<String>) {
        self.replies
            .lock()
            .insert(method.to_string(), Reply::Error(message.into()));
    }

    /// All calls received so far, oldest first.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.calls.lock().clone()
    }

    /// Waits for the next call not yet returned by this method.
    pub async fn next_call(&self) -> Option<MethodCall> {
        self.receiver.lock().await.recv().await
    }

    fn record(&self, call: &MethodCall) {
        trace!(transport = %self.name, method = %call.method, "Loopback call");
        self.calls.lock().push(call.clone());
        // The receiver lives as long as self
        let _ = self.sender.send(call.clone());
    }

    fn scripted(&self, method: &str) -> Option<Result<Value>> {
        self.replies.lock().get(method).map(|reply| match reply {
            Reply::Value(value) => Ok(value.clone()),
            Reply::Error(message) => Err(BridgeError::Transport {
                method: method.to_string(),
                message: message.clone(),
            }),
        })
    }
}

#[async_trait]
impl MethodTransport for LoopbackTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, call: MethodCall) -> Result<()> {
        self.record(&call);
        match self.scripted(&call.method) {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    async fn invoke_with_result(&self, call: MethodCall) -> Result<Value> {
        self.record(&call);
        self.scripted(&call.method)
            .unwrap_or_else(|| Err(BridgeError::NotImplemented(call.method.clone())))
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("name", &self.name)
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}
