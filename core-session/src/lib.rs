//! # Session Bridge Core
//!
//! Keeps a platform media session in sync with playback driven by an
//! application running in a separate execution context.
//!
//! ## Overview
//!
//! This crate handles:
//! - The authoritative playback state record and its edge-driven reactions
//! - Foreground lifecycle (session activation, wake lock, notification)
//! - Stable queue handles for platform queue items
//! - A metadata cache for synchronous platform lookups
//! - Two rebindable method channels (UI and background) with typed messages
//! - Pending results for UI commands that wait on the other side
//!
//! [`SessionBridge`] owns all of the above. Host integrations implement
//! [`bridge_traits::session::PlatformSessionHost`] and
//! [`bridge_traits::channel::MethodTransport`] and feed inbound calls to
//! [`SessionBridge::dispatch_handler_call`] and
//! [`SessionBridge::dispatch_client_call`].
//!
//! ## Feature Flags
//!
//! - `desktop-shims`: fall back to a headless session host when none is
//!   supplied

pub mod bridge;
pub mod channel;
pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod metadata;
pub mod notification;
pub mod pending;
pub mod queue;
pub mod relay;
pub mod state;

pub use bridge::{BrowserRoot, SessionBridge, SessionBridgeBuilder};
pub use channel::{Channel, ChannelKind};
pub use error::{Result, SessionError};
pub use lifecycle::{ForegroundLifecycle, LifecycleStats};
pub use messages::{
    ClientCommand, ClientEvent, HandlerCommand, HandlerEvent, HandlerQuery, MediaButton, MediaKey,
    TransportControl,
};
pub use metadata::{MediaItem, MetadataCache, Rating, RatingStyle};
pub use pending::{PendingCommand, PendingHandle, PendingResults};
pub use queue::{QueueHandle, QueueIdentityMap};
pub use state::{
    ActionMask, AudioProcessingState, MediaAction, MediaControl, PlaybackState, RepeatMode,
    ShuffleMode,
};
