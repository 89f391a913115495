//! Rebindable Method Channels
//!
//! ## Overview
//!
//! The bridge talks to two independently-lifecycled endpoints: the UI process
//! and the background execution context. Each is a [`Channel`] holding an
//! optional `Arc<dyn MethodTransport>` that can be swapped at any time, for
//! example when the real background context finishes booting and replaces a
//! placeholder transport.
//!
//! Swapping is atomic: the binding is replaced under a short write lock, and
//! every outbound call clones the current binding before awaiting, so a call
//! already in flight keeps its transport alive and completes on it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::channel::{MethodCall, MethodTransport};
use core_runtime::events::{EventBus, LifecycleEvent, SessionEvent};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// Which side of the application a channel talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// UI process: configure/connect, state relays
    Client,
    /// Background execution context: commands in, transport events out
    Handler,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Client => f.write_str("client"),
            ChannelKind::Handler => f.write_str("handler"),
        }
    }
}

struct Binding {
    transport: Arc<dyn MethodTransport>,
    generation: u64,
}

/// One outbound method channel with a swappable transport.
pub struct Channel {
    kind: ChannelKind,
    binding: RwLock<Option<Arc<Binding>>>,
    generation: AtomicU64,
    events: Arc<EventBus>,
}

impl Channel {
    pub fn new(kind: ChannelKind, events: Arc<EventBus>) -> Self {
        Self {
            kind,
            binding: RwLock::new(None),
            generation: AtomicU64::new(0),
            events,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Points the channel at `transport`, replacing any previous binding.
    ///
    /// Returns the new binding generation.
    pub fn bind(&self, transport: Arc<dyn MethodTransport>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let name = transport.name().to_string();
        let previous = self.binding.write().replace(Arc::new(Binding {
            transport,
            generation,
        }));

        info!(
            channel = %self.kind,
            transport = %name,
            generation,
            replaced = previous.is_some(),
            "Channel bound"
        );
        let _ = self
            .events
            .emit(SessionEvent::Lifecycle(LifecycleEvent::ChannelRebound {
                channel: self.kind.to_string(),
                transport: name,
            }));
        generation
    }

    /// Drops the current binding. In-flight calls still complete.
    pub fn unbind(&self) {
        if self.binding.write().take().is_some() {
            debug!(channel = %self.kind, "Channel unbound");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.binding.read().is_some()
    }

    /// Generation of the current binding, if any.
    pub fn generation(&self) -> Option<u64> {
        self.binding.read().as_ref().map(|b| b.generation)
    }

    fn current(&self) -> Option<Arc<Binding>> {
        self.binding.read().clone()
    }

    /// Fire-and-forget call.
    ///
    /// Returns `false` when nothing is bound or the transport failed; the
    /// failure is logged and never propagated.
    pub async fn invoke(&self, call: MethodCall) -> bool {
        let Some(binding) = self.current() else {
            debug!(channel = %self.kind, method = %call.method, "Dropping call, channel unbound");
            return false;
        };

        let method = call.method.clone();
        match binding.transport.invoke(call).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    channel = %self.kind,
                    method = %method,
                    generation = binding.generation,
                    error = %e,
                    "Channel call failed"
                );
                false
            }
        }
    }

    /// Call that waits for the remote reply.
    ///
    /// # Errors
    ///
    /// [`SessionError::ChannelUnavailable`] when nothing is bound, otherwise
    /// whatever the transport reports.
    pub async fn invoke_with_result(&self, call: MethodCall) -> Result<Value> {
        let binding = self
            .current()
            .ok_or(SessionError::ChannelUnavailable(self.kind))?;
        Ok(binding.transport.invoke_with_result(call).await?)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.binding.read();
        f.debug_struct("Channel")
            .field("kind", &self.kind)
            .field(
                "transport",
                &binding.as_ref().map(|b| b.transport.name().to_string()),
            )
            .field("generation", &binding.as_ref().map(|b| b.generation))
            .finish()
    }
}
