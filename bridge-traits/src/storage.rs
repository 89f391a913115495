//! Persistent preferences.
//!
//! The session configuration is written here on every successful
//! `configure` so that a process started by the system (a media button
//! press after the UI was killed) can rebuild notification and button
//! behaviour before any UI connects.

use async_trait::async_trait;

use crate::error::Result;

/// Typed key-value store backed by the platform's preferences facility
/// (SharedPreferences, UserDefaults, or a SQLite table on desktop).
///
/// Reading a key through an accessor of a different type than it was
/// written with may fail; implementations are not required to coerce.
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_color(store: &dyn SettingsStore, argb: i64) -> Result<()> {
///     store.set_i64("notificationColor", argb).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// True when `key` holds a value of any type.
    async fn has_key(&self, key: &str) -> Result<bool>;
}
