//! # Session Configuration Module
//!
//! Configuration shared by the UI process and the background execution context.
//!
//! ## Overview
//!
//! The UI sends a `configure` call carrying a [`SessionConfig`]. The bridge
//! persists it through a [`SettingsStore`] so that a background context the
//! system starts on its own (a media button press after the UI was killed, a
//! browsing client connecting) can rebuild the same notification and button
//! behaviour without the UI being present.
//!
//! Persisted keys keep the names the host platforms already use
//! (`androidResumeOnClick`, `notificationColor`, ...). Runtime-only options
//! (package name, pending-result timeout, event buffer) are never persisted.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SessionConfig;
//! use std::time::Duration;
//!
//! let config = SessionConfig::builder()
//!     .package_name("com.example.player")
//!     .notification_channel_name("Playback")
//!     .stop_foreground_on_pause(false)
//!     .pending_result_timeout(Some(Duration::from_secs(10)))
//!     .build()?;
//!
//! config.save(settings_store.as_ref()).await?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::storage::SettingsStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Default notification icon resource.
pub const DEFAULT_NOTIFICATION_ICON: &str = "mipmap/ic_launcher";

/// Default package name used to derive the notification channel id.
pub const DEFAULT_PACKAGE_NAME: &str = "session_bridge";

/// Default time a pending result waits for its completion signal.
pub const DEFAULT_PENDING_RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Persisted key names.
pub mod keys {
    pub const RESUME_ON_CLICK: &str = "androidResumeOnClick";
    pub const NOTIFICATION_CHANNEL_ID: &str = "androidNotificationChannelId";
    pub const NOTIFICATION_CHANNEL_NAME: &str = "androidNotificationChannelName";
    pub const NOTIFICATION_CHANNEL_DESCRIPTION: &str = "androidNotificationChannelDescription";
    pub const NOTIFICATION_COLOR: &str = "notificationColor";
    pub const NOTIFICATION_ICON: &str = "androidNotificationIcon";
    pub const SHOW_NOTIFICATION_BADGE: &str = "androidShowNotificationBadge";
    pub const NOTIFICATION_CLICK_STARTS_ACTIVITY: &str = "androidNotificationClickStartsActivity";
    pub const NOTIFICATION_ONGOING: &str = "androidNotificationOngoing";
    pub const STOP_FOREGROUND_ON_PAUSE: &str = "androidStopForegroundOnPause";
    pub const ART_DOWNSCALE_WIDTH: &str = "artDownscaleWidth";
    pub const ART_DOWNSCALE_HEIGHT: &str = "artDownscaleHeight";
    pub const ACTIVITY_CLASS_NAME: &str = "activityClassName";
    pub const BROWSABLE_ROOT_EXTRAS: &str = "androidBrowsableRootExtras";
}

/// Session configuration.
///
/// Serialized field names match the persisted keys so that a `configure`
/// payload can be decoded directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A play/pause button press while paused resumes playback directly
    #[serde(rename = "androidResumeOnClick")]
    pub resume_on_click: bool,
    #[serde(rename = "androidNotificationChannelId")]
    pub notification_channel_id: Option<String>,
    #[serde(rename = "androidNotificationChannelName")]
    pub notification_channel_name: Option<String>,
    #[serde(rename = "androidNotificationChannelDescription")]
    pub notification_channel_description: Option<String>,
    /// ARGB colour; `-1` means host default
    #[serde(rename = "notificationColor")]
    pub notification_color: i64,
    #[serde(rename = "androidNotificationIcon")]
    pub notification_icon: String,
    #[serde(rename = "androidShowNotificationBadge")]
    pub show_notification_badge: bool,
    #[serde(rename = "androidNotificationClickStartsActivity")]
    pub notification_click_starts_activity: bool,
    #[serde(rename = "androidNotificationOngoing")]
    pub notification_ongoing: bool,
    /// Leave foreground mode and release the wake lock when paused
    #[serde(rename = "androidStopForegroundOnPause")]
    pub stop_foreground_on_pause: bool,
    /// `-1` disables downscaling
    #[serde(rename = "artDownscaleWidth")]
    pub art_downscale_width: i64,
    #[serde(rename = "artDownscaleHeight")]
    pub art_downscale_height: i64,
    #[serde(rename = "activityClassName")]
    pub activity_class_name: Option<String>,
    #[serde(rename = "androidBrowsableRootExtras")]
    pub browsable_root_extras: Option<Map<String, Value>>,

    /// Package name, used to derive the default notification channel id
    #[serde(skip)]
    pub package_name: String,
    /// How long a pending result waits before failing; `None` waits forever
    #[serde(skip)]
    pub pending_result_timeout: Option<Duration>,
    /// Event bus buffer size
    #[serde(skip)]
    pub event_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resume_on_click: true,
            notification_channel_id: None,
            notification_channel_name: None,
            notification_channel_description: None,
            notification_color: -1,
            notification_icon: DEFAULT_NOTIFICATION_ICON.to_string(),
            show_notification_badge: false,
            notification_click_starts_activity: true,
            notification_ongoing: false,
            stop_foreground_on_pause: true,
            art_downscale_width: -1,
            art_downscale_height: -1,
            activity_class_name: None,
            browsable_root_extras: None,
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            pending_result_timeout: Some(DEFAULT_PENDING_RESULT_TIMEOUT),
            event_buffer_size: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl SessionConfig {
    /// Creates a new builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Decodes a `configure` payload. Missing fields take their defaults.
    pub fn from_wire(value: Value) -> Result<Self> {
        let config: SessionConfig = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Invalid session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - An ongoing notification is only allowed when foreground mode is left on pause
    /// - Art downscale sizes are positive or `-1`, and set together
    /// - The pending-result timeout is not zero
    /// - The event buffer is not empty
    pub fn validate(&self) -> Result<()> {
        if self.notification_ongoing && !self.stop_foreground_on_pause {
            return Err(Error::Config(
                "An ongoing notification requires stop_foreground_on_pause, \
                 otherwise a paused session could never be dismissed"
                    .to_string(),
            ));
        }

        for (name, size) in [
            ("width", self.art_downscale_width),
            ("height", self.art_downscale_height),
        ] {
            if size == 0 || size < -1 {
                return Err(Error::Config(format!(
                    "Art downscale {} must be positive or -1, got {}",
                    name, size
                )));
            }
        }

        if (self.art_downscale_width == -1) != (self.art_downscale_height == -1) {
            return Err(Error::Config(
                "Art downscale width and height must be set together".to_string(),
            ));
        }

        if self.pending_result_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "Pending result timeout must be greater than zero (use None to disable)"
                    .to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.package_name.is_empty() {
            return Err(Error::Config("Package name cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Notification channel id, defaulting to `<package>.channel`.
    pub fn resolved_channel_id(&self) -> String {
        self.notification_channel_id
            .clone()
            .unwrap_or_else(|| format!("{}.channel", self.package_name))
    }

    /// Notification colour, `None` when the host default applies.
    pub fn notification_color(&self) -> Option<i64> {
        (self.notification_color != -1).then_some(self.notification_color)
    }

    /// Copies the persisted fields of `other` into `self`, keeping runtime options.
    pub fn apply_persisted(&mut self, other: &SessionConfig) {
        let runtime = (
            std::mem::take(&mut self.package_name),
            self.pending_result_timeout,
            self.event_buffer_size,
        );
        *self = other.clone();
        self.package_name = runtime.0;
        self.pending_result_timeout = runtime.1;
        self.event_buffer_size = runtime.2;
    }

    /// Loads persisted fields from `store`; runtime options keep their defaults.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let defaults = SessionConfig::default();

        let browsable_root_extras = match store.get_string(keys::BROWSABLE_ROOT_EXTRAS).await? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                Error::Config(format!("Corrupt browsable root extras: {}", e))
            })?),
            None => None,
        };

        let config = SessionConfig {
            resume_on_click: store
                .get_bool(keys::RESUME_ON_CLICK)
                .await?
                .unwrap_or(defaults.resume_on_click),
            notification_channel_id: store.get_string(keys::NOTIFICATION_CHANNEL_ID).await?,
            notification_channel_name: store.get_string(keys::NOTIFICATION_CHANNEL_NAME).await?,
            notification_channel_description: store
                .get_string(keys::NOTIFICATION_CHANNEL_DESCRIPTION)
                .await?,
            notification_color: store
                .get_i64(keys::NOTIFICATION_COLOR)
                .await?
                .unwrap_or(defaults.notification_color),
            notification_icon: store
                .get_string(keys::NOTIFICATION_ICON)
                .await?
                .unwrap_or(defaults.notification_icon),
            show_notification_badge: store
                .get_bool(keys::SHOW_NOTIFICATION_BADGE)
                .await?
                .unwrap_or(defaults.show_notification_badge),
            notification_click_starts_activity: store
                .get_bool(keys::NOTIFICATION_CLICK_STARTS_ACTIVITY)
                .await?
                .unwrap_or(defaults.notification_click_starts_activity),
            notification_ongoing: store
                .get_bool(keys::NOTIFICATION_ONGOING)
                .await?
                .unwrap_or(defaults.notification_ongoing),
            stop_foreground_on_pause: store
                .get_bool(keys::STOP_FOREGROUND_ON_PAUSE)
                .await?
                .unwrap_or(defaults.stop_foreground_on_pause),
            art_downscale_width: store
                .get_i64(keys::ART_DOWNSCALE_WIDTH)
                .await?
                .unwrap_or(defaults.art_downscale_width),
            art_downscale_height: store
                .get_i64(keys::ART_DOWNSCALE_HEIGHT)
                .await?
                .unwrap_or(defaults.art_downscale_height),
            activity_class_name: store.get_string(keys::ACTIVITY_CLASS_NAME).await?,
            browsable_root_extras,
            ..defaults
        };

        debug!(
            resume_on_click = config.resume_on_click,
            stop_foreground_on_pause = config.stop_foreground_on_pause,
            "Loaded session config"
        );
        Ok(config)
    }

    /// Writes every persisted field to `store`. `None` values delete their key.
    pub async fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        store
            .set_bool(keys::RESUME_ON_CLICK, self.resume_on_click)
            .await?;
        put_optional(
            store,
            keys::NOTIFICATION_CHANNEL_ID,
            self.notification_channel_id.as_deref(),
        )
        .await?;
        put_optional(
            store,
            keys::NOTIFICATION_CHANNEL_NAME,
            self.notification_channel_name.as_deref(),
        )
        .await?;
        put_optional(
            store,
            keys::NOTIFICATION_CHANNEL_DESCRIPTION,
            self.notification_channel_description.as_deref(),
        )
        .await?;
        store
            .set_i64(keys::NOTIFICATION_COLOR, self.notification_color)
            .await?;
        store
            .set_string(keys::NOTIFICATION_ICON, &self.notification_icon)
            .await?;
        store
            .set_bool(keys::SHOW_NOTIFICATION_BADGE, self.show_notification_badge)
            .await?;
        store
            .set_bool(
                keys::NOTIFICATION_CLICK_STARTS_ACTIVITY,
                self.notification_click_starts_activity,
            )
            .await?;
        store
            .set_bool(keys::NOTIFICATION_ONGOING, self.notification_ongoing)
            .await?;
        store
            .set_bool(keys::STOP_FOREGROUND_ON_PAUSE, self.stop_foreground_on_pause)
            .await?;
        store
            .set_i64(keys::ART_DOWNSCALE_WIDTH, self.art_downscale_width)
            .await?;
        store
            .set_i64(keys::ART_DOWNSCALE_HEIGHT, self.art_downscale_height)
            .await?;
        put_optional(
            store,
            keys::ACTIVITY_CLASS_NAME,
            self.activity_class_name.as_deref(),
        )
        .await?;

        let extras = match &self.browsable_root_extras {
            Some(extras) => Some(
                serde_json::to_string(extras)
                    .map_err(|e| Error::Internal(format!("Failed to encode extras: {}", e)))?,
            ),
            None => None,
        };
        put_optional(store, keys::BROWSABLE_ROOT_EXTRAS, extras.as_deref()).await?;

        debug!("Saved session config");
        Ok(())
    }
}

async fn put_optional(store: &dyn SettingsStore, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => store.set_string(key, value).await?,
        None => store.delete(key).await?,
    }
    Ok(())
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn resume_on_click(mut self, enabled: bool) -> Self {
        self.config.resume_on_click = enabled;
        self
    }

    pub fn notification_channel_id(mut self, id: impl Into<String>) -> Self {
        self.config.notification_channel_id = Some(id.into());
        self
    }

    pub fn notification_channel_name(mut self, name: impl Into<String>) -> Self {
        self.config.notification_channel_name = Some(name.into());
        self
    }

    pub fn notification_channel_description(mut self, description: impl Into<String>) -> Self {
        self.config.notification_channel_description = Some(description.into());
        self
    }

    pub fn notification_color(mut self, argb: i64) -> Self {
        self.config.notification_color = argb;
        self
    }

    pub fn notification_icon(mut self, icon: impl Into<String>) -> Self {
        self.config.notification_icon = icon.into();
        self
    }

    pub fn show_notification_badge(mut self, show: bool) -> Self {
        self.config.show_notification_badge = show;
        self
    }

    pub fn notification_click_starts_activity(mut self, enabled: bool) -> Self {
        self.config.notification_click_starts_activity = enabled;
        self
    }

    pub fn notification_ongoing(mut self, ongoing: bool) -> Self {
        self.config.notification_ongoing = ongoing;
        self
    }

    /// Leave foreground mode when paused.
    ///
    /// Some platforms kill paused-but-foregrounded services, others need the
    /// service to stay foregrounded for media buttons to keep routing.
    pub fn stop_foreground_on_pause(mut self, enabled: bool) -> Self {
        self.config.stop_foreground_on_pause = enabled;
        self
    }

    pub fn art_downscale_size(mut self, width: i64, height: i64) -> Self {
        self.config.art_downscale_width = width;
        self.config.art_downscale_height = height;
        self
    }

    pub fn activity_class_name(mut self, name: impl Into<String>) -> Self {
        self.config.activity_class_name = Some(name.into());
        self
    }

    pub fn browsable_root_extras(mut self, extras: Map<String, Value>) -> Self {
        self.config.browsable_root_extras = Some(extras);
        self
    }

    pub fn package_name(mut self, name: impl Into<String>) -> Self {
        self.config.package_name = name.into();
        self
    }

    pub fn pending_result_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pending_result_timeout = timeout;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Map-backed store that keeps typed values as strings.
    #[derive(Default)]
    struct MemorySettingsStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl MemorySettingsStore {
        fn put(&self, key: &str, value: String) {
            self.values.lock().unwrap().insert(key.to_string(), value);
        }

        fn fetch(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl SettingsStore for MemorySettingsStore {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.put(key, value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.fetch(key))
        }

        async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
            self.put(key, value.to_string());
            Ok(())
        }

        async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
            Ok(self.fetch(key).map(|v| v == "true"))
        }

        async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
            self.put(key, value.to_string());
            Ok(())
        }

        async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
            Ok(self.fetch(key).and_then(|v| v.parse().ok()))
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn has_key(&self, key: &str) -> BridgeResult<bool> {
            Ok(self.values.lock().unwrap().contains_key(key))
        }
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.resume_on_click);
        assert!(config.stop_foreground_on_pause);
        assert!(config.notification_click_starts_activity);
        assert!(!config.notification_ongoing);
        assert_eq!(config.notification_icon, "mipmap/ic_launcher");
        assert_eq!(config.notification_color(), None);
        assert_eq!(config.resolved_channel_id(), "session_bridge.channel");
        assert_eq!(
            config.pending_result_timeout,
            Some(DEFAULT_PENDING_RESULT_TIMEOUT)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .package_name("com.example.player")
            .notification_channel_name("Playback")
            .notification_color(0xFF2196F3)
            .stop_foreground_on_pause(false)
            .art_downscale_size(256, 256)
            .pending_result_timeout(None)
            .build()
            .unwrap();

        assert_eq!(config.resolved_channel_id(), "com.example.player.channel");
        assert_eq!(config.notification_color(), Some(0xFF2196F3));
        assert!(!config.stop_foreground_on_pause);
        assert_eq!(config.pending_result_timeout, None);
    }

    #[test]
    fn test_ongoing_requires_stop_foreground_on_pause() {
        let result = SessionConfig::builder()
            .notification_ongoing(true)
            .stop_foreground_on_pause(false)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_art_size() {
        let result = SessionConfig::builder().art_downscale_size(0, 100).build();
        assert!(result.is_err());

        let result = SessionConfig::builder().art_downscale_size(-1, 100).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = SessionConfig::builder()
            .pending_result_timeout(Some(Duration::ZERO))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_wire_uses_persisted_names() {
        let config = SessionConfig::from_wire(json!({
            "androidResumeOnClick": false,
            "androidNotificationChannelName": "Music",
            "androidStopForegroundOnPause": false,
            "androidBrowsableRootExtras": {"android.media.browse.SEARCH_SUPPORTED": true}
        }))
        .unwrap();

        assert!(!config.resume_on_click);
        assert_eq!(config.notification_channel_name.as_deref(), Some("Music"));
        assert!(!config.stop_foreground_on_pause);
        assert_eq!(config.notification_icon, DEFAULT_NOTIFICATION_ICON);
        assert!(config.browsable_root_extras.is_some());
    }

    #[test]
    fn test_apply_persisted_keeps_runtime_options() {
        let mut live = SessionConfig::builder()
            .package_name("com.example")
            .pending_result_timeout(Some(Duration::from_secs(5)))
            .build()
            .unwrap();
        let incoming = SessionConfig::builder()
            .resume_on_click(false)
            .build()
            .unwrap();

        live.apply_persisted(&incoming);

        assert!(!live.resume_on_click);
        assert_eq!(live.package_name, "com.example");
        assert_eq!(live.pending_result_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_load_from_empty_store_gives_defaults() {
        let store = MemorySettingsStore::default();
        let config = SessionConfig::load(&store).await.unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemorySettingsStore::default();
        let mut extras = Map::new();
        extras.insert("recent".to_string(), json!(true));

        let config = SessionConfig::builder()
            .resume_on_click(false)
            .notification_channel_name("Playback")
            .notification_color(0xFF00FF00)
            .activity_class_name("com.example.MainActivity")
            .browsable_root_extras(extras)
            .build()
            .unwrap();
        config.save(&store).await.unwrap();

        let loaded = SessionConfig::load(&store).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_save_deletes_cleared_optionals() {
        let store = MemorySettingsStore::default();
        store
            .set_string(keys::ACTIVITY_CLASS_NAME, "com.example.Old")
            .await
            .unwrap();

        SessionConfig::default().save(&store).await.unwrap();

        assert!(!store.has_key(keys::ACTIVITY_CLASS_NAME).await.unwrap());
        assert!(store.has_key(keys::RESUME_ON_CLICK).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_surfaces_store_errors() {
        struct BrokenStore;

        #[async_trait]
        impl SettingsStore for BrokenStore {
            async fn set_string(&self, _: &str, _: &str) -> BridgeResult<()> {
                Ok(())
            }
            async fn get_string(&self, _: &str) -> BridgeResult<Option<String>> {
                Err(bridge_traits::BridgeError::DatabaseError("locked".to_string()))
            }
            async fn set_bool(&self, _: &str, _: bool) -> BridgeResult<()> {
                Ok(())
            }
            async fn get_bool(&self, _: &str) -> BridgeResult<Option<bool>> {
                Ok(None)
            }
            async fn set_i64(&self, _: &str, _: i64) -> BridgeResult<()> {
                Ok(())
            }
            async fn get_i64(&self, _: &str) -> BridgeResult<Option<i64>> {
                Ok(None)
            }
            async fn delete(&self, _: &str) -> BridgeResult<()> {
                Ok(())
            }
            async fn has_key(&self, _: &str) -> BridgeResult<bool> {
                Ok(false)
            }        }

        let result = SessionConfig::load(&BrokenStore).await;
        assert!(matches!(result, Err(Error::Settings(_))));
    }
}
