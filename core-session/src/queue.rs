//! Queue Identity Map
//!
//! The platform queue API addresses items by integer handle while the
//! application identifies them by string media id. This module hands out one
//! handle per media id and never reuses or reassigns it for the lifetime of
//! the bridge, so a "skip to item" callback always resolves to the item the
//! platform was showing when the user tapped it.
//!
//! There is no removal: memory grows with the number of distinct ids ever
//! queued in one bridge lifetime.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Result, SessionError};

/// Integer handle used by the platform queue.
pub type QueueHandle = i64;

#[derive(Debug, Default)]
struct Inner {
    next: QueueHandle,
    by_id: HashMap<String, QueueHandle>,
    by_handle: HashMap<QueueHandle, String>,
}

/// Bijection between media ids and monotonically increasing handles.
///
/// A single mutex guards allocation because a queue replace can race with a
/// platform skip-to-item callback.
#[derive(Debug, Default)]
pub struct QueueIdentityMap {
    inner: Mutex<Inner>,
}

impl QueueIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `media_id`, allocating the next one on first use.
    pub fn assign(&self, media_id: &str) -> QueueHandle {
        let mut inner = self.inner.lock();
        if let Some(&handle) = inner.by_id.get(media_id) {
            trace!(media_id, handle, "Reusing queue handle");
            return handle;
        }

        let handle = inner.next;
        inner.next += 1;
        inner.by_id.insert(media_id.to_string(), handle);
        inner.by_handle.insert(handle, media_id.to_string());
        debug!(media_id, handle, "Assigned queue handle");
        handle
    }

    /// Resolves a handle back to its media id.
    pub fn lookup(&self, handle: QueueHandle) -> Result<String> {
        self.inner
            .lock()
            .by_handle
            .get(&handle)
            .cloned()
            .ok_or(SessionError::UnknownHandle(handle))
    }

    /// Handle previously assigned to `media_id`, without allocating.
    pub fn handle_of(&self, media_id: &str) -> Option<QueueHandle> {
        self.inner.lock().by_id.get(media_id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every mapping at bridge teardown. The counter is not rewound,
    /// so a handle issued before the reset can never resolve to a new item.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.by_id.clear();
        inner.by_handle.clear();
    }
}
