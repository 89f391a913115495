//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the session synchronization core
//! and the platform hosting it. Each trait represents a capability that the
//! core requires but that must be implemented differently per platform
//! (Android media session, iOS remote command center, desktop MPRIS/SMTC).
//!
//! ## Traits
//!
//! ### Media Session
//! - [`PlatformSessionHost`](session::PlatformSessionHost) - Session activation, foreground mode, notification, wake lock, playback descriptors
//!
//! ### Messaging
//! - [`MethodTransport`](channel::MethodTransport) - Outbound half of a UI or background method channel
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage for the persisted session configuration
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Headless host + SQLite settings |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. A host
//! should convert platform failures to `BridgeError` with enough context to act
//! on (method name, remote message). The core never lets these errors escape
//! into platform callbacks; it logs them and degrades to a no-op.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single bridge instance
//! can be shared across async tasks.

pub mod channel;
pub mod error;
pub mod session;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use channel::{MethodCall, MethodTransport};
pub use session::{
    MediaDescription, NotificationAction, NotificationSpec, PlatformError, PlatformPlaybackState,
    PlatformQueueItem, PlatformSessionHost, PlaybackInfo, PlaybackPhase, NOTIFICATION_ID,
};
pub use storage::SettingsStore;
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
