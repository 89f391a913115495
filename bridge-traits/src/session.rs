//! Platform Media Session Abstractions
//!
//! The capability surface the core needs from the host's native media-session
//! subsystem: session activation, foreground promotion, notification display,
//! wake-lock management, and the playback/metadata/queue descriptors shown on
//! lock screens and Bluetooth devices.
//!
//! ## Overview
//!
//! The core never talks to an OS session object directly. Every side effect of
//! the session lifecycle goes through [`PlatformSessionHost`], which keeps the
//! synchronization logic testable without a real device.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Notification id used for the playback notification.
pub const NOTIFICATION_ID: u32 = 1124;

/// Playback phase as understood by the platform session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackPhase {
    None,
    Connecting,
    Buffering,
    Playing,
    Paused,
    Error,
}

/// Error attached to a platform playback descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformError {
    pub code: i32,
    pub message: Option<String>,
}

/// Playback descriptor pushed to the platform session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPlaybackState {
    pub phase: PlaybackPhase,
    /// Enabled action bits (platform action bit positions).
    pub actions: u64,
    pub position_ms: i64,
    pub buffered_position_ms: i64,
    pub speed: f32,
    /// Wall-clock time at which `position_ms` was accurate.
    pub update_time: DateTime<Utc>,
    /// Handle of the active queue item, if any.
    pub active_queue_item_id: Option<i64>,
    pub error: Option<PlatformError>,
    pub repeat_mode: i32,
    pub shuffle_mode: i32,
    pub captioning_enabled: bool,
}

/// Description of a media item as shown by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescription {
    pub media_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub icon_uri: Option<String>,
    pub duration_ms: Option<i64>,
    pub playable: bool,
    pub extras: Option<Map<String, Value>>,
}

/// Entry of the integer-addressed platform queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformQueueItem {
    pub handle: i64,
    pub description: MediaDescription,
}

/// A button shown on the playback notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub icon: String,
    pub label: String,
    /// Single action bit this button triggers.
    pub action: u64,
}

/// Everything needed to build the playback notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    pub id: u32,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub channel_description: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub icon: String,
    /// ARGB colour, `None` when the host default applies.
    pub color: Option<i64>,
    pub ongoing: bool,
    pub show_badge: bool,
    pub click_starts_activity: bool,
    pub activity_class_name: Option<String>,
    pub actions: Vec<NotificationAction>,
    pub compact_action_indices: Vec<usize>,
    pub playing: bool,
}

/// Where audio is rendered and who owns the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "playbackType", rename_all = "camelCase")]
pub enum PlaybackInfo {
    Local,
    #[serde(rename_all = "camelCase")]
    Remote {
        volume_control_type: i32,
        max_volume: i32,
        volume: i32,
    },
}

/// Host media-session capability.
///
/// Implementations must make the wake-lock and activation calls idempotent:
/// the core checks [`is_wake_lock_held`](Self::is_wake_lock_held) and
/// [`is_session_active`](Self::is_session_active) before acting, but several
/// edges may race before a release is observed.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::session::{PlatformSessionHost, NotificationSpec};
///
/// async fn show(host: &dyn PlatformSessionHost, spec: &NotificationSpec) -> Result<()> {
///     host.start_foreground(spec).await?;
///     host.acquire_wake_lock().await
/// }
/// ```
#[async_trait]
pub trait PlatformSessionHost: Send + Sync {
    /// Whether the platform session is currently active (visible to the system)
    fn is_session_active(&self) -> bool;

    /// Activate or deactivate the platform session
    async fn set_session_active(&self, active: bool) -> Result<()>;

    /// Promote the execution context to foreground mode showing `notification`
    async fn start_foreground(&self, notification: &NotificationSpec) -> Result<()>;

    /// Leave foreground mode, optionally removing the notification
    async fn stop_foreground(&self, remove_notification: bool) -> Result<()>;

    /// Post or replace the playback notification
    async fn post_notification(&self, notification: &NotificationSpec) -> Result<()>;

    /// Cancel the notification with the given id
    async fn cancel_notification(&self, id: u32) -> Result<()>;

    /// Whether the wake lock is currently held
    fn is_wake_lock_held(&self) -> bool;

    /// Acquire the partial wake lock
    async fn acquire_wake_lock(&self) -> Result<()>;

    /// Release the partial wake lock
    async fn release_wake_lock(&self) -> Result<()>;

    /// Publish the playback descriptor
    async fn set_playback_state(&self, state: &PlatformPlaybackState) -> Result<()>;

    /// Publish (or clear) the now-playing metadata
    async fn set_metadata(&self, metadata: Option<&MediaDescription>) -> Result<()>;

    /// Publish the queue
    async fn set_queue(&self, queue: &[PlatformQueueItem]) -> Result<()>;

    /// Switch between local and remote playback
    async fn set_playback_info(&self, info: &PlaybackInfo) -> Result<()>;

    /// Tell browsing clients that the children of `parent_id` changed
    async fn notify_children_changed(
        &self,
        parent_id: &str,
        options: Option<&Map<String, Value>>,
    ) -> Result<()>;

    /// Ask the runtime to terminate the background execution context
    async fn request_stop_self(&self) -> Result<()>;
}
