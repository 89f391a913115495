//! Headless Platform Session Host
//!
//! A [`PlatformSessionHost`] with no system integration behind it. It keeps
//! the state a real media session would hold (active flag, wake lock,
//! foreground notification, last pushed descriptor) in memory and counts every
//! transition, which makes it the host for desktop runs without a system media
//! session and for tests that assert on lifecycle side effects.

use std::collections::HashMap;

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    session::{
        MediaDescription, NotificationSpec, PlatformPlaybackState, PlatformQueueItem,
        PlatformSessionHost, PlaybackInfo,
    },
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Transition counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCounters {
    pub session_activated: u64,
    pub session_deactivated: u64,
    pub foreground_started: u64,
    pub foreground_stopped: u64,
    pub wake_lock_acquired: u64,
    pub wake_lock_released: u64,
    pub notifications_posted: u64,
    pub notifications_cancelled: u64,
    pub stop_self_requested: u64,
    pub playback_state_updates: u64,
    pub metadata_updates: u64,
    pub queue_updates: u64,
}

#[derive(Default)]
struct HostState {
    session_active: bool,
    wake_lock_held: bool,
    foreground: bool,
    notification: Option<NotificationSpec>,
    playback_state: Option<PlatformPlaybackState>,
    metadata: Option<MediaDescription>,
    queue: Vec<PlatformQueueItem>,
    playback_info: Option<PlaybackInfo>,
    children_changed: Vec<String>,
    counters: HostCounters,
    failures: HashMap<String, BridgeError>,
}

/// In-memory session host.
#[derive(Default)]
pub struct HeadlessSessionHost {
    state: Mutex<HostState>,
}

impl HeadlessSessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `step` (a trait method name such as
    /// `"stop_foreground"`) fail with `error`.
    pub fn fail_next(&self, step: &str, error: BridgeError) {
        self.state.lock().failures.insert(step.to_string(), error);
    }

    fn check(&self, state: &mut HostState, step: &str) -> Result<()> {
        match state.failures.remove(step) {
            Some(error) => {
                debug!(step, error = %error, "Injected host failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    pub fn counters(&self) -> HostCounters {
        self.state.lock().counters
    }

    pub fn is_foreground(&self) -> bool {
        self.state.lock().foreground
    }

    /// Notification currently shown, if any.
    pub fn last_notification(&self) -> Option<NotificationSpec> {
        self.state.lock().notification.clone()
    }

    pub fn last_playback_state(&self) -> Option<PlatformPlaybackState> {
        self.state.lock().playback_state.clone()
    }

    pub fn last_metadata(&self) -> Option<MediaDescription> {
        self.state.lock().metadata.clone()
    }

    pub fn queue(&self) -> Vec<PlatformQueueItem> {
        self.state.lock().queue.clone()
    }

    pub fn playback_info(&self) -> Option<PlaybackInfo> {
        self.state.lock().playback_info
    }

    /// Parent ids passed to `notify_children_changed`, oldest first.
    pub fn children_changed(&self) -> Vec<String> {
        self.state.lock().children_changed.clone()
    }
}

#[async_trait]
impl PlatformSessionHost for HeadlessSessionHost {
    fn is_session_active(&self) -> bool {
        self.state.lock().session_active
    }

    async fn set_session_active(&self, active: bool) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "set_session_active")?;
        if state.session_active != active {
            if active {
                state.counters.session_activated += 1;
            } else {
                state.counters.session_deactivated += 1;
            }
        }
        state.session_active = active;
        trace!(active, "Session active flag set");
        Ok(())
    }

    async fn start_foreground(&self, notification: &NotificationSpec) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "start_foreground")?;
        state.foreground = true;
        state.notification = Some(notification.clone());
        state.counters.foreground_started += 1;
        Ok(())
    }

    async fn stop_foreground(&self, remove_notification: bool) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "stop_foreground")?;
        state.foreground = false;
        if remove_notification {
            state.notification = None;
        }
        state.counters.foreground_stopped += 1;
        Ok(())
    }

    async fn post_notification(&self, notification: &NotificationSpec) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "post_notification")?;
        state.notification = Some(notification.clone());
        state.counters.notifications_posted += 1;
        Ok(())
    }

    async fn cancel_notification(&self, id: u32) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "cancel_notification")?;
        if state.notification.as_ref().map(|n| n.id) == Some(id) {
            state.notification = None;
        }
        state.counters.notifications_cancelled += 1;
        Ok(())
    }

    fn is_wake_lock_held(&self) -> bool {
        self.state.lock().wake_lock_held
    }

    async fn acquire_wake_lock(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "acquire_wake_lock")?;
        state.wake_lock_held = true;
        state.counters.wake_lock_acquired += 1;
        Ok(())
    }

    async fn release_wake_lock(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "release_wake_lock")?;
        state.wake_lock_held = false;
        state.counters.wake_lock_released += 1;
        Ok(())
    }

    async fn set_playback_state(&self, playback: &PlatformPlaybackState) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "set_playback_state")?;
        state.playback_state = Some(playback.clone());
        state.counters.playback_state_updates += 1;
        Ok(())
    }

    async fn set_metadata(&self, metadata: Option<&MediaDescription>) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "set_metadata")?;
        state.metadata = metadata.cloned();
        state.counters.metadata_updates += 1;
        Ok(())
    }

    async fn set_queue(&self, queue: &[PlatformQueueItem]) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "set_queue")?;
        state.queue = queue.to_vec();
        state.counters.queue_updates += 1;
        Ok(())
    }

    async fn set_playback_info(&self, info: &PlaybackInfo) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "set_playback_info")?;
        state.playback_info = Some(*info);
        Ok(())
    }

    async fn notify_children_changed(
        &self,
        parent_id: &str,
        _options: Option<&Map<String, Value>>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "notify_children_changed")?;
        state.children_changed.push(parent_id.to_string());
        Ok(())
    }

    async fn request_stop_self(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.check(&mut state, "request_stop_self")?;
        state.counters.stop_self_requested += 1;
        debug!("Stop requested for background context");
        Ok(())
    }
}

impl std::fmt::Debug for HeadlessSessionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HeadlessSessionHost")
            .field("session_active", &state.session_active)
            .field("wake_lock_held", &state.wake_lock_held)
            .field("foreground", &state.foreground)
            .field("counters", &state.counters)
            .finish()
    }
}
