//! UI channel relay.
//!
//! Subscribes to the bridge's [`EventBus`] and mirrors playback, media item
//! and queue changes to the UI channel, the same notifications a platform
//! media controller would deliver to a connected UI.

use std::sync::Arc;

use core_runtime::events::{EventBus, SessionEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::channel::Channel;
use crate::error::{Result, SessionError};
use crate::messages::ClientEvent;

/// Background task forwarding bus events to the client channel.
#[derive(Debug)]
pub struct UiRelay {
    task: JoinHandle<()>,
}

impl UiRelay {
    /// Spawns the relay on the current tokio runtime.
    pub fn spawn(events: &EventBus, client: Arc<Channel>) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            SessionError::Runtime(core_runtime::Error::Config(
                "The UI relay must be started inside a tokio runtime".to_string(),
            ))
        })?;

        let mut stream = events.stream().filter(SessionEvent::is_relayed_to_ui);
        let task = handle.spawn(async move {
            loop {
                let event = match stream.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "UI relay lagged behind the event bus");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(message) = to_client_event(event) else {
                    continue;
                };
                let call = message.to_call();
                trace!(method = %call.method, "Relaying to UI");
                client.invoke(call).await;
            }
            debug!("UI relay stopped");
        });

        Ok(Self { task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for UiRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn to_client_event(event: SessionEvent) -> Option<ClientEvent> {
    match event {
        SessionEvent::PlaybackStateChanged { state } => Some(ClientEvent::PlaybackStateChanged(state)),
        SessionEvent::MediaItemChanged { item } => Some(ClientEvent::MediaItemChanged(item)),
        SessionEvent::QueueChanged { queue } => Some(ClientEvent::QueueChanged(queue)),
        SessionEvent::Lifecycle(_) => None,
    }
}
