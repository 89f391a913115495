//! Method Channel Abstractions
//!
//! A method channel carries named calls with a JSON payload between the core
//! and one side of the host application. Two channels exist at runtime: one
//! bound to the UI process and one bound to the background execution context.
//! Either may be (re)bound at any time, so the core only ever holds a
//! transport through `Arc<dyn MethodTransport>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A named call with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Call with an empty argument map.
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Object(Default::default()))
    }
}

/// Outbound half of a method channel.
///
/// # Errors
///
/// `invoke_with_result` reports a remote failure as
/// [`BridgeError::Transport`](crate::error::BridgeError::Transport) and a
/// missing remote handler as
/// [`BridgeError::NotImplemented`](crate::error::BridgeError::NotImplemented).
#[async_trait]
pub trait MethodTransport: Send + Sync {
    /// Human-readable transport name used in logs
    fn name(&self) -> &str;

    /// Send a call without waiting for its result
    async fn invoke(&self, call: MethodCall) -> Result<()>;

    /// Send a call and wait for the remote reply
    async fn invoke_with_result(&self, call: MethodCall) -> Result<Value>;
}
