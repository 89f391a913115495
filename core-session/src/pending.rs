//! Pending Result Broker
//!
//! ## Overview
//!
//! Some commands complete only when a later signal arrives on the *other*
//! channel: `configure` on the UI channel resolves once the platform session
//! reports it is connected, `start` resolves when the background context says
//! `started`, and so on. [`PendingResults`] keeps one slot per
//! `(channel, command)` pair; each slot carries a correlation id so a late
//! timeout can never remove a slot that a newer request installed.
//!
//! Installing over an outstanding slot rejects the old caller with
//! [`SessionError::Superseded`] rather than silently dropping it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::ChannelKind;
use crate::error::{Result, SessionError};

/// Commands whose completion is signalled asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingCommand {
    /// UI `configure`, resolved when the session connects
    Configure,
    /// Resolved by the background context's `ready`
    Connect,
    /// Resolved by `started`
    Start,
    /// Resolved by `stopped`
    Stop,
}

impl fmt::Display for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingCommand::Configure => "configure",
            PendingCommand::Connect => "connect",
            PendingCommand::Start => "start",
            PendingCommand::Stop => "stop",
        };
        f.write_str(name)
    }
}

type SlotKey = (ChannelKind, PendingCommand);

struct Slot {
    correlation_id: Uuid,
    sender: oneshot::Sender<Result<Value>>,
}

type Slots = Arc<Mutex<HashMap<SlotKey, Slot>>>;

/// Single-slot correlators keyed by `(channel, command)`.
pub struct PendingResults {
    slots: Slots,
    timeout: Option<Duration>,
}

impl PendingResults {
    /// `timeout = None` waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Installs a slot for `command`, superseding any outstanding one.
    pub fn install(&self, channel: ChannelKind, command: PendingCommand) -> PendingHandle {
        let (sender, receiver) = oneshot::channel();
        let correlation_id = Uuid::new_v4();

        let stale = self.slots.lock().insert(
            (channel, command),
            Slot {
                correlation_id,
                sender,
            },
        );

        if let Some(stale) = stale {
            warn!(
                %channel,
                %command,
                stale = %stale.correlation_id,
                "Superseding outstanding pending result"
            );
            let _ = stale
                .sender
                .send(Err(SessionError::Superseded { channel, command }));
        }
        debug!(%channel, %command, %correlation_id, "Pending result installed");

        PendingHandle {
            channel,
            command,
            correlation_id,
            receiver,
            timeout: self.timeout,
            slots: Arc::clone(&self.slots),
        }
    }

    /// Completes the outstanding slot, if any. Returns whether one existed.
    pub fn resolve(&self, channel: ChannelKind, command: PendingCommand, value: Value) -> bool {
        let Some(slot) = self.slots.lock().remove(&(channel, command)) else {
            debug!(%channel, %command, "No pending result to complete");
            return false;
        };
        info!(
            %channel,
            %command,
            correlation_id = %slot.correlation_id,
            "Pending result completed"
        );
        // The waiter may have given up already
        let _ = slot.sender.send(Ok(value));
        true
    }

    /// Rejects every outstanding slot with [`SessionError::Cancelled`].
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(SlotKey, Slot)> = self.slots.lock().drain().collect();
        let count = drained.len();
        for ((channel, command), slot) in drained {
            debug!(%channel, %command, "Cancelling pending result");
            let _ = slot.sender.send(Err(SessionError::Cancelled { command }));
        }
        count
    }

    pub fn is_pending(&self, channel: ChannelKind, command: PendingCommand) -> bool {
        self.slots.lock().contains_key(&(channel, command))
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PendingResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResults")
            .field("outstanding", &self.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Waiter side of an installed slot.
#[must_use = "a pending result does nothing unless awaited"]
pub struct PendingHandle {
    channel: ChannelKind,
    command: PendingCommand,
    correlation_id: Uuid,
    receiver: oneshot::Receiver<Result<Value>>,
    timeout: Option<Duration>,
    slots: Slots,
}

impl PendingHandle {
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Waits for the slot to be resolved, rejected or to expire.
    pub async fn wait(self) -> Result<Value> {
        let PendingHandle {
            channel,
            command,
            correlation_id,
            receiver,
            timeout,
            slots,
        } = self;

        let received = match timeout {
            Some(after) => match tokio::time::timeout(after, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    let mut guard = slots.lock();
                    if guard
                        .get(&(channel, command))
                        .is_some_and(|slot| slot.correlation_id == correlation_id)
                    {
                        guard.remove(&(channel, command));
                    }
                    drop(guard);
                    warn!(%channel, %command, %correlation_id, ?after, "Pending result timed out");
                    return Err(SessionError::TimedOut {
                        channel,
                        command,
                        after,
                    });
                }
            },
            None => receiver.await,
        };

        received.unwrap_or(Err(SessionError::Cancelled { command }))
    }
}
