//! # Event Bus System
//!
//! Broadcasts what the platform session currently shows, using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The session bridge is the only publisher. Every mutation that reaches the
//! platform session (playback descriptor, now-playing item, queue) and every
//! lifecycle edge (activation, foreground, teardown, channel rebinding) is
//! published as a [`SessionEvent`]. The UI channel relay subscribes to this bus
//! and forwards `onPlaybackStateChanged`, `onMediaItemChanged` and
//! `onQueueChanged` to the UI process.
//!
//! ```text
//! ┌───────────────┐  emit   ┌──────────┐ subscribe ┌──────────────┐
//! │ SessionBridge ├────────>│ EventBus ├──────────>│ UI relay     │
//! └───────────────┘         │          ├──────────>│ tests / host │
//!                           └──────────┘           └──────────────┘
//! ```
//!
//! Payloads are carried in their wire representation (`serde_json::Value`) so
//! that relays can forward them without knowing the session types.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the next event carries a full snapshot anyway.
//! - **`RecvError::Closed`**: The bridge was dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// Events published by the session bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    /// The platform playback descriptor changed
    PlaybackStateChanged { state: Value },
    /// The now-playing item changed (`Value::Null` when cleared)
    MediaItemChanged { item: Value },
    /// The platform queue was replaced
    QueueChanged { queue: Value },
    /// Session lifecycle edge
    Lifecycle(LifecycleEvent),
}

impl SessionEvent {
    /// Human readable description
    pub fn description(&self) -> &str {
        match self {
            SessionEvent::PlaybackStateChanged { .. } => "Playback state changed",
            SessionEvent::MediaItemChanged { .. } => "Media item changed",
            SessionEvent::QueueChanged { .. } => "Queue changed",
            SessionEvent::Lifecycle(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            SessionEvent::Lifecycle(LifecycleEvent::TornDown) => EventSeverity::Info,
            SessionEvent::Lifecycle(LifecycleEvent::SessionActivated) => EventSeverity::Info,
            SessionEvent::Lifecycle(LifecycleEvent::TeardownFailed { .. }) => {
                EventSeverity::Warning
            }
            _ => EventSeverity::Debug,
        }
    }

    /// Whether the UI channel relay forwards this event
    pub fn is_relayed_to_ui(&self) -> bool {
        !matches!(self, SessionEvent::Lifecycle(_))
    }
}

/// Severity level of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Session lifecycle edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// The platform session became active (idle -> non-idle)
    SessionActivated,
    /// Foreground mode entered (playing false -> true)
    EnteredForeground,
    /// Playing stopped; `demoted` tells whether foreground mode was left
    LeftPlaying { demoted: bool },
    /// Full teardown completed
    TornDown,
    /// A teardown step failed on the host; teardown continued
    TeardownFailed { step: String, message: String },
    /// A channel was pointed at a new transport
    ChannelRebound { channel: String, transport: String },
    /// The UI channel finished the configure handshake
    Connected,
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::SessionActivated => "Platform session activated",
            LifecycleEvent::EnteredForeground => "Entered foreground playback",
            LifecycleEvent::LeftPlaying { .. } => "Left playing state",
            LifecycleEvent::TornDown => "Session torn down",
            LifecycleEvent::TeardownFailed { .. } => "Teardown step failed",
            LifecycleEvent::ChannelRebound { .. } => "Channel rebound",
            LifecycleEvent::Connected => "Session connected",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel of [`SessionEvent`]s.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// there are none.
    pub fn emit(&self, event: SessionEvent) -> Result<usize, SendError<SessionEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Subscribes and wraps the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&SessionEvent) -> bool + Send + Sync>;

/// Receiver with an optional predicate.
///
/// ```ignore
/// let mut ui_events = bus.stream().filter(SessionEvent::is_relayed_to_ui);
/// while let Ok(event) = ui_events.recv().await {
///     relay.forward(event).await;
/// }
/// ```
pub struct EventStream {
    receiver: Receiver<SessionEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<SessionEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SessionEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receive the next matching event.
    pub async fn recv(&mut self) -> Result<SessionEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<SessionEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
