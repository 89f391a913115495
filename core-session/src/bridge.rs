//! # Session Bridge
//!
//! Top-level owner of the playback state record, the queue identity map, the
//! metadata cache, the foreground lifecycle and both method channels.
//!
//! ## Overview
//!
//! The bridge exposes three surfaces:
//!
//! - **Application commands** arriving on the background channel
//!   (`setState`, `setQueue`, ...), see [`SessionBridge::dispatch_handler_call`]
//! - **UI commands** arriving on the client channel (`configure`, `start`,
//!   ...), see [`SessionBridge::dispatch_client_call`]
//! - **Platform callbacks** from the host media session (transport controls,
//!   media keys, browse queries), forwarded to the application as events
//!
//! It is the only writer of the playback state record. Mutations are
//! serialized through one async mutex, which also orders the host calls each
//! mutation makes.
//!
//! ## State edges
//!
//! `setState` replaces the snapshot wholesale and then reacts to edges between
//! the old and new snapshot, in this order:
//!
//! 1. The platform descriptor is pushed
//! 2. `idle -> non-idle` activates the platform session
//! 3. `playing false -> true` enters playing; `true -> false` exits playing
//! 4. `non-idle -> idle` tears the session down; otherwise the notification
//!    is refreshed if it has been shown
//!
//! A first `setState` that is already idle is a no-op for the lifecycle.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_session::SessionBridge;
//! use std::sync::Arc;
//!
//! let bridge = SessionBridge::builder()
//!     .with_host(host)
//!     .with_settings_store(settings)
//!     .with_handler_transport(background)
//!     .build()
//!     .await?;
//!
//! // Wire inbound calls from each transport to the bridge
//! let reply = bridge.dispatch_handler_call(call).await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::channel::{MethodCall, MethodTransport};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::session::{
    MediaDescription, PlatformPlaybackState, PlatformQueueItem, PlatformSessionHost, PlaybackInfo,
};
use bridge_traits::storage::SettingsStore;
use bridge_traits::time::{Clock, SystemClock};
use chrono::{TimeZone, Utc};
use core_runtime::config::keys;
use core_runtime::events::{EventBus, EventStream, LifecycleEvent, SessionEvent};
use core_runtime::SessionConfig;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::channel::{Channel, ChannelKind};
use crate::error::Result;
use crate::lifecycle::{ForegroundLifecycle, LifecycleStats};
use crate::messages::{
    decode_reply, ChildrenReply, ClientCommand, ClientPlaybackState, Extras, HandlerCommand,
    HandlerEvent, HandlerQuery, MediaButton, MediaItemReply, MediaKey, SearchReply,
    TransportControl,
};
use crate::metadata::{MediaItem, MetadataCache};
use crate::notification::build_notification;
use crate::pending::{PendingCommand, PendingResults};
use crate::queue::{QueueHandle, QueueIdentityMap};
use crate::relay::UiRelay;
use crate::state::{ActionMask, PlaybackState};

/// Root id offered to browsers.
pub const BROWSABLE_ROOT_ID: &str = "root";
/// Root id offered when a browser asks for recently played content.
pub const RECENT_ROOT_ID: &str = "recent";

/// Browse root handed to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserRoot {
    pub id: String,
    pub extras: Option<Map<String, Value>>,
}

struct SessionState {
    playback: PlaybackState,
    platform: Option<PlatformPlaybackState>,
    media_item: Option<MediaItem>,
    queue: Vec<PlatformQueueItem>,
    playback_info: PlaybackInfo,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            playback: PlaybackState::idle(),
            platform: None,
            media_item: None,
            queue: Vec::new(),
            playback_info: PlaybackInfo::Local,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Links {
    /// A UI controller is connected to the platform session
    session_connected: bool,
    /// The background context reported `ready`
    background_ready: bool,
    /// The background context reported `started` and not yet `stopped`
    background_running: bool,
}

/// Session synchronization bridge.
pub struct SessionBridge {
    config: RwLock<SessionConfig>,
    host: Arc<dyn PlatformSessionHost>,
    settings: Option<Arc<dyn SettingsStore>>,
    clock: Arc<dyn Clock>,
    state: tokio::sync::Mutex<SessionState>,
    links: Mutex<Links>,
    queue_map: QueueIdentityMap,
    metadata: MetadataCache,
    lifecycle: ForegroundLifecycle,
    pending: PendingResults,
    client: Arc<Channel>,
    handler: Arc<Channel>,
    events: Arc<EventBus>,
    relay: Mutex<Option<UiRelay>>,
    destroyed: AtomicBool,
}

impl SessionBridge {
    pub fn builder() -> SessionBridgeBuilder {
        SessionBridgeBuilder::default()
    }

    // ========================================================================
    // Application commands
    // ========================================================================

    /// Replaces the playback state and reacts to its edges.
    ///
    /// Host failures are logged and never abort the edge processing, so the
    /// lifecycle bookkeeping always matches the last accepted snapshot.
    #[instrument(skip(self, new), fields(processing_state = ?new.processing_state, playing = new.playing))]
    pub async fn set_state(&self, new: PlaybackState) -> Result<()> {
        let new = new.normalized();
        let config = self.config.read().clone();
        let mut state = self.state.lock().await;

        let old = std::mem::replace(&mut state.playback, new.clone());
        let platform = self.platform_state(&new, &state.queue);
        state.platform = Some(platform.clone());

        let outcome = self.host.set_playback_state(&platform).await;
        self.host_step("set_playback_state", outcome);

        let notification = build_notification(&config, state.media_item.as_ref(), &new);

        let mut entered = false;
        if old.is_idle() && !new.is_idle() {
            debug!("Start edge");
            if let Err(e) = self.lifecycle.activate().await {
                warn!(error = %e, "Failed to activate platform session");
            }
            // Playing carried through a teardown: no playing edge, but the
            // foreground resources are gone and must be taken again.
            if old.playing && new.playing && !self.lifecycle.is_foreground() {
                entered = true;
                if let Err(e) = self.lifecycle.resume_foreground(&notification).await {
                    warn!(error = %e, "Failed to restore foreground playback");
                }
            }
        }

        if !old.playing && new.playing {
            entered = true;
            if let Err(e) = self.lifecycle.enter_playing(&notification).await {
                warn!(error = %e, "Failed to enter playing state");
            }
        } else if old.playing && !new.playing {
            if let Err(e) = self
                .lifecycle
                .exit_playing(config.stop_foreground_on_pause)
                .await
            {
                warn!(error = %e, "Failed to exit playing state");
            }
        }

        if !old.is_idle() && new.is_idle() {
            debug!("Stop edge");
            self.lifecycle.teardown().await;
        } else if !new.is_idle() && !entered {
            if let Err(e) = self.lifecycle.refresh_notification(&notification).await {
                warn!(error = %e, "Failed to refresh notification");
            }
        }

        self.emit(SessionEvent::PlaybackStateChanged {
            state: client_state_value(&new, &platform),
        });
        Ok(())
    }

    /// Sets the now-playing item and caches it.
    #[instrument(skip(self, item), fields(media_id = %item.id))]
    pub async fn set_media_item(&self, item: MediaItem) -> Result<()> {
        self.metadata.put(item.clone());
        let config = self.config.read().clone();
        let mut state = self.state.lock().await;

        let description = item.to_description();
        let outcome = self.host.set_metadata(Some(&description)).await;
        self.host_step("set_metadata", outcome);

        state.media_item = Some(item.clone());
        if !state.playback.is_idle() {
            let notification = build_notification(&config, state.media_item.as_ref(), &state.playback);
            if let Err(e) = self.lifecycle.refresh_notification(&notification).await {
                warn!(error = %e, "Failed to refresh notification");
            }
        }

        self.emit(SessionEvent::MediaItemChanged {
            item: to_value(&item),
        });
        Ok(())
    }

    /// Replaces the queue. Every item gets its handle and cache entry before
    /// the platform queue is touched.
    #[instrument(skip(self, items), fields(len = items.len()))]
    pub async fn set_queue(&self, items: Vec<MediaItem>) -> Result<()> {
        let queue: Vec<PlatformQueueItem> = items
            .iter()
            .map(|item| {
                let handle = self.queue_map.assign(&item.id);
                self.metadata.put(item.clone());
                PlatformQueueItem {
                    handle,
                    description: item.to_description(),
                }
            })
            .collect();

        let mut state = self.state.lock().await;
        let outcome = self.host.set_queue(&queue).await;
        self.host_step("set_queue", outcome);
        state.queue = queue;

        self.emit(SessionEvent::QueueChanged {
            queue: to_value(&items),
        });
        Ok(())
    }

    /// Records `info` and pushes it to the host. The record is kept even when
    /// the host rejects it, so a later `setState` reports what the
    /// application asked for.
    pub async fn set_playback_info(&self, info: PlaybackInfo) -> Result<()> {
        let mut state = self.state.lock().await;
        state.playback_info = info;
        let outcome = self.host.set_playback_info(&info).await;
        self.host_step("set_playback_info", outcome);
        Ok(())
    }

    pub async fn notify_children_changed(&self, parent_media_id: &str, options: Extras) -> Result<()> {
        let outcome = self
            .host
            .notify_children_changed(parent_media_id, options.as_ref())
            .await;
        self.host_step("notify_children_changed", outcome);
        Ok(())
    }

    /// Stops the service the same way an idle `setState` would.
    ///
    /// When the state is already idle there is no stop edge, so teardown is
    /// run directly; the service always ends up stopped.
    pub async fn stop_service(&self) -> Result<()> {
        let current = self.state.lock().await.playback.clone();
        if !current.is_idle() || current.playing {
            self.set_state(PlaybackState {
                repeat_mode: current.repeat_mode,
                shuffle_mode: current.shuffle_mode,
                ..PlaybackState::idle()
            })
            .await?;
        }
        if current.is_idle() {
            self.lifecycle.teardown().await;
        }
        Ok(())
    }

    // ========================================================================
    // Channel dispatch
    // ========================================================================

    /// Handles one inbound call from the background channel.
    pub async fn dispatch_handler_call(&self, call: MethodCall) -> Result<Value> {
        let command = HandlerCommand::decode(&call)?;
        debug!(method = command.method(), "Handler command");

        match command {
            HandlerCommand::SetMediaItem(item) => self.set_media_item(item).await?,
            HandlerCommand::SetQueue(items) => self.set_queue(items).await?,
            HandlerCommand::SetState(state) => self.set_state(state).await?,
            HandlerCommand::SetPlaybackInfo(info) => self.set_playback_info(info).await?,
            HandlerCommand::NotifyChildrenChanged {
                parent_media_id,
                options,
            } => self.notify_children_changed(&parent_media_id, options).await?,
            HandlerCommand::StopService => self.stop_service().await?,
            HandlerCommand::Ready => {
                self.links.lock().background_ready = true;
                self.pending
                    .resolve(ChannelKind::Client, PendingCommand::Connect, json!({}));
            }
            HandlerCommand::Started => {
                self.links.lock().background_running = true;
                self.pending
                    .resolve(ChannelKind::Client, PendingCommand::Start, json!({}));
            }
            HandlerCommand::Stopped => {
                {
                    let mut links = self.links.lock();
                    links.background_running = false;
                    links.background_ready = false;
                }
                self.pending
                    .resolve(ChannelKind::Client, PendingCommand::Stop, json!({}));
            }
        }
        Ok(Value::Null)
    }

    /// Handles one inbound call from the UI channel.
    ///
    /// Commands that depend on the other side complete when it reports back,
    /// or fail with [`crate::SessionError::TimedOut`] / [`crate::SessionError::Superseded`].
    pub async fn dispatch_client_call(&self, call: MethodCall) -> Result<Value> {
        match ClientCommand::decode(&call)? {
            ClientCommand::Configure(config) => self.configure(*config).await,
            ClientCommand::Connect => {
                let handle = {
                    let links = self.links.lock();
                    if links.background_ready {
                        return Ok(json!({}));
                    }
                    self.pending.install(ChannelKind::Client, PendingCommand::Connect)
                };
                handle.wait().await
            }
            ClientCommand::Disconnect => {
                self.links.lock().session_connected = false;
                debug!("UI disconnected from session");
                Ok(json!({}))
            }
            ClientCommand::Start => {
                let handle = {
                    let links = self.links.lock();
                    if links.background_running {
                        return Ok(json!({}));
                    }
                    self.pending.install(ChannelKind::Client, PendingCommand::Start)
                };
                handle.wait().await
            }
            ClientCommand::Stop => {
                let handle = {
                    let links = self.links.lock();
                    if !links.background_running {
                        return Ok(json!({}));
                    }
                    self.pending.install(ChannelKind::Client, PendingCommand::Stop)
                };
                self.send_handler_event(HandlerEvent::Stop).await;
                handle.wait().await
            }
            ClientCommand::IsRunning => Ok(json!(self.links.lock().background_running)),
        }
    }

    /// Persists and applies a UI configuration; completes once a UI
    /// controller is connected to the session.
    #[instrument(skip(self, config))]
    pub async fn configure(&self, config: SessionConfig) -> Result<Value> {
        self.config.write().apply_persisted(&config);
        let applied = self.config.read().clone();

        if let Some(settings) = &self.settings {
            if let Err(e) = applied.save(settings.as_ref()).await {
                warn!(error = %e, "Failed to persist session configuration");
            }
        }
        info!(
            channel_id = %applied.resolved_channel_id(),
            resume_on_click = applied.resume_on_click,
            stop_foreground_on_pause = applied.stop_foreground_on_pause,
            "Session configured"
        );

        let handle = {
            let links = self.links.lock();
            if links.session_connected {
                return Ok(json!({}));
            }
            self.pending
                .install(ChannelKind::Client, PendingCommand::Configure)
        };
        handle.wait().await
    }

    /// A UI controller connected to the platform session.
    ///
    /// Relays the current state, queue and item, then completes a pending
    /// `configure`.
    pub async fn on_session_connected(&self) {
        self.links.lock().session_connected = true;

        {
            let state = self.state.lock().await;
            let platform = state
                .platform
                .clone()
                .unwrap_or_else(|| self.platform_state(&state.playback, &state.queue));
            self.emit(SessionEvent::PlaybackStateChanged {
                state: client_state_value(&state.playback, &platform),
            });

            let queue: Vec<MediaItem> = state
                .queue
                .iter()
                .map(|q| self.metadata.get_or_stub(&q.description.media_id))
                .collect();
            self.emit(SessionEvent::QueueChanged {
                queue: to_value(&queue),
            });
            self.emit(SessionEvent::MediaItemChanged {
                item: state.media_item.as_ref().map(to_value).unwrap_or(Value::Null),
            });
        }

        info!("Session connected");
        self.emit(SessionEvent::Lifecycle(LifecycleEvent::Connected));
        self.pending
            .resolve(ChannelKind::Client, PendingCommand::Configure, json!({}));
    }

    // ========================================================================
    // Platform callbacks
    // ========================================================================

    /// Forwards a transport control to the application.
    ///
    /// Returns `false` when the control could not be delivered: unknown queue
    /// handle, no background channel, or a transport failure.
    pub async fn on_transport_control(&self, control: TransportControl) -> bool {
        match self.resolve_control(control) {
            Some(event) => self.send_handler_event(event).await,
            None => false,
        }
    }

    fn resolve_control(&self, control: TransportControl) -> Option<HandlerEvent> {
        Some(match control {
            TransportControl::Play => HandlerEvent::Play,
            TransportControl::Pause => HandlerEvent::Pause,
            TransportControl::Stop => HandlerEvent::Stop,
            TransportControl::Prepare => HandlerEvent::Prepare,
            TransportControl::PrepareFromMediaId { media_id, extras } => {
                HandlerEvent::PrepareFromMediaId { media_id, extras }
            }
            TransportControl::PrepareFromSearch { query, extras } => {
                HandlerEvent::PrepareFromSearch { query, extras }
            }
            TransportControl::PrepareFromUri { uri, extras } => {
                HandlerEvent::PrepareFromUri { uri, extras }
            }
            TransportControl::PlayFromMediaId { media_id, extras } => {
                HandlerEvent::PlayFromMediaId { media_id, extras }
            }
            TransportControl::PlayFromSearch { query, extras } => {
                HandlerEvent::PlayFromSearch { query, extras }
            }
            TransportControl::PlayFromUri { uri, extras } => HandlerEvent::PlayFromUri { uri, extras },
            TransportControl::PlayMediaItem(description) => {
                HandlerEvent::PlayMediaItem(self.resolve_item(&description))
            }
            TransportControl::SeekTo { position_ms } => HandlerEvent::SeekTo {
                position_us: position_ms.saturating_mul(1000),
            },
            TransportControl::SkipToNext => HandlerEvent::SkipToNext,
            TransportControl::SkipToPrevious => HandlerEvent::SkipToPrevious,
            TransportControl::SkipToQueueItem(handle) => match self.queue_map.lookup(handle) {
                Ok(media_id) => HandlerEvent::SkipToQueueItem { media_id },
                Err(e) => {
                    warn!(handle, error = %e, "Ignoring skip to unknown queue item");
                    return None;
                }
            },
            TransportControl::FastForward => HandlerEvent::FastForward,
            TransportControl::Rewind => HandlerEvent::Rewind,
            TransportControl::SetRating { rating, extras } => HandlerEvent::SetRating { rating, extras },
            TransportControl::SetRepeatMode(mode) => HandlerEvent::SetRepeatMode(mode),
            TransportControl::SetShuffleMode(mode) => HandlerEvent::SetShuffleMode(mode),
            TransportControl::SetCaptioningEnabled(enabled) => {
                HandlerEvent::SetCaptioningEnabled(enabled)
            }
            TransportControl::SetSpeed(speed) => HandlerEvent::SetSpeed(speed),
            TransportControl::CustomAction { name, extras } => {
                HandlerEvent::CustomAction { name, extras }
            }
            TransportControl::AddQueueItem(description) => {
                let item = self.resolve_item(&description);
                self.metadata.put(item.clone());
                HandlerEvent::AddQueueItem(item)
            }
            TransportControl::InsertQueueItem { description, index } => {
                let item = self.resolve_item(&description);
                self.metadata.put(item.clone());
                HandlerEvent::InsertQueueItem {
                    media_item: item,
                    index,
                }
            }
            TransportControl::RemoveQueueItem(description) => {
                let item = self.resolve_item(&description);
                self.metadata.put(item.clone());
                HandlerEvent::RemoveQueueItem(item)
            }
            TransportControl::RemoveQueueItemAt(index) => HandlerEvent::RemoveQueueItemAt(index),
            TransportControl::SetVolumeTo(volume) => HandlerEvent::SetVolumeTo(volume),
            TransportControl::AdjustVolume(direction) => HandlerEvent::AdjustVolume(direction),
        })
    }

    /// Cached record for a platform description, or a stub built from it.
    fn resolve_item(&self, description: &MediaDescription) -> MediaItem {
        self.metadata.get(&description.media_id).unwrap_or_else(|| {
            debug!(media_id = %description.media_id, "Metadata cache miss, using platform description");
            MediaItem::from_description(description)
        })
    }

    /// Handles a hardware media key.
    ///
    /// A play/pause style press while paused resumes directly when
    /// `resume_on_click` is set; otherwise it is reported as a click.
    pub async fn on_media_key(&self, key: MediaKey) -> bool {
        let event = match key {
            MediaKey::Stop => HandlerEvent::Stop,
            MediaKey::FastForward => HandlerEvent::FastForward,
            MediaKey::Rewind => HandlerEvent::Rewind,
            MediaKey::Next => HandlerEvent::Click(MediaButton::Next),
            MediaKey::Previous => HandlerEvent::Click(MediaButton::Previous),
            MediaKey::Play | MediaKey::Pause | MediaKey::PlayPause | MediaKey::HeadsetHook => {
                let resume_on_click = self.config.read().resume_on_click;
                if resume_on_click && self.state.lock().await.playback.is_paused() {
                    HandlerEvent::Play
                } else {
                    HandlerEvent::Click(MediaButton::Media)
                }
            }
        };
        self.send_handler_event(event).await
    }

    /// Browse root for a connecting browser.
    pub fn get_root(&self, recent: bool) -> BrowserRoot {
        BrowserRoot {
            id: if recent { RECENT_ROOT_ID } else { BROWSABLE_ROOT_ID }.to_string(),
            extras: self.config.read().browsable_root_extras.clone(),
        }
    }

    /// Children of `parent_media_id`, or `None` when the application could
    /// not answer.
    pub async fn get_children(&self, parent_media_id: &str, options: Extras) -> Option<Vec<MediaItem>> {
        let reply: ChildrenReply = self
            .query(HandlerQuery::GetChildren {
                parent_media_id: parent_media_id.to_string(),
                options,
            })
            .await?;
        self.metadata.put_all(reply.children.iter().cloned());
        Some(reply.children)
    }

    /// A single item. Falls back to the cache when the application cannot
    /// answer; `None` when nothing is known about `media_id`.
    pub async fn get_media_item(&self, media_id: &str) -> Option<MediaItem> {
        let reply: Option<MediaItemReply> = self
            .query(HandlerQuery::GetMediaItem {
                media_id: media_id.to_string(),
            })
            .await;

        match reply {
            Some(MediaItemReply {
                media_item: Some(item),
            }) => {
                self.metadata.put(item.clone());
                Some(item)
            }
            Some(MediaItemReply { media_item: None }) => None,
            None => self.metadata.get(media_id),
        }
    }

    pub async fn search(&self, query: &str, extras: Extras) -> Option<Vec<MediaItem>> {
        let reply: SearchReply = self
            .query(HandlerQuery::Search {
                query: query.to_string(),
                extras,
            })
            .await?;
        self.metadata.put_all(reply.media_items.iter().cloned());
        Some(reply.media_items)
    }

    async fn query<T: DeserializeOwned>(&self, query: HandlerQuery) -> Option<T> {
        let call = query.to_call();
        let method = call.method.clone();
        let outcome = match self.handler.invoke_with_result(call).await {
            Ok(value) => decode_reply::<T>(&method, value),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(
                    method = %method,
                    error = %e,
                    transient = e.is_transient(),
                    "Browse query failed"
                );
                None
            }
        }
    }

    /// Synchronous metadata lookup for platform callbacks that cannot wait
    /// for a channel round trip. Never fails; unknown ids yield a stub.
    pub fn cached_item(&self, media_id: &str) -> MediaItem {
        self.metadata.get_or_stub(media_id)
    }

    pub async fn on_task_removed(&self) -> bool {
        self.send_handler_event(HandlerEvent::TaskRemoved).await
    }

    pub async fn on_notification_deleted(&self) -> bool {
        self.send_handler_event(HandlerEvent::NotificationDeleted).await
    }

    async fn send_handler_event(&self, event: HandlerEvent) -> bool {
        debug!(method = event.method(), "Forwarding to application");
        self.handler.invoke(event.to_call()).await
    }

    // ========================================================================
    // Channels and lifecycle
    // ========================================================================

    pub fn bind_client(&self, transport: Arc<dyn MethodTransport>) -> u64 {
        self.client.bind(transport)
    }

    /// Points the background channel at a new transport. Calls already in
    /// flight complete on the transport they started on.
    pub fn bind_handler(&self, transport: Arc<dyn MethodTransport>) -> u64 {
        self.handler.bind(transport)
    }

    /// Tears everything down. Runs once; later calls are no-ops.
    ///
    /// Clears the queue map, metadata cache and state, unbinds both channels
    /// and fails every outstanding pending result with
    /// [`crate::SessionError::Cancelled`].
    #[instrument(skip(self))]
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!("Bridge already destroyed");
            return;
        }

        self.lifecycle.teardown().await;
        *self.state.lock().await = SessionState::default();
        self.queue_map.reset();
        self.metadata.clear();
        *self.links.lock() = Links::default();
        self.client.unbind();
        self.handler.unbind();
        let cancelled = self.pending.cancel_all();
        if let Some(relay) = self.relay.lock().take() {
            relay.stop();
        }
        info!(cancelled, "Session bridge destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub async fn playback_state(&self) -> PlaybackState {
        self.state.lock().await.playback.clone()
    }

    pub async fn platform_playback_state(&self) -> Option<PlatformPlaybackState> {
        self.state.lock().await.platform.clone()
    }

    pub async fn media_item(&self) -> Option<MediaItem> {
        self.state.lock().await.media_item.clone()
    }

    /// The queue as last pushed to the platform.
    pub async fn platform_queue(&self) -> Vec<PlatformQueueItem> {
        self.state.lock().await.queue.clone()
    }

    pub async fn playback_info(&self) -> PlaybackInfo {
        self.state.lock().await.playback_info
    }

    pub fn queue_handle(&self, media_id: &str) -> Option<QueueHandle> {
        self.queue_map.handle_of(media_id)
    }

    pub fn config(&self) -> SessionConfig {
        self.config.read().clone()
    }

    pub fn lifecycle_stats(&self) -> LifecycleStats {
        self.lifecycle.stats()
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn subscribe(&self) -> EventStream {
        self.events.stream()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn platform_state(&self, state: &PlaybackState, queue: &[PlatformQueueItem]) -> PlatformPlaybackState {
        let update_time = state
            .update_time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(|| self.clock.now());

        PlatformPlaybackState {
            phase: state.phase(),
            actions: state.action_bits(),
            position_ms: state.position,
            buffered_position_ms: state.buffered_position,
            speed: state.speed,
            update_time,
            active_queue_item_id: state
                .queue_index
                .and_then(|index| queue.get(index))
                .map(|item| item.handle),
            error: state.platform_error(),
            repeat_mode: state.repeat_mode.into(),
            shuffle_mode: state.shuffle_mode.into(),
            captioning_enabled: state.captioning_enabled,
        }
    }

    fn host_step(&self, step: &'static str, outcome: BridgeResult<()>) {
        if let Err(e) = outcome {
            warn!(step, error = %e, transient = e.is_transient(), "Host call failed");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.emit(event);
    }
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("host", &"<PlatformSessionHost>")
            .field("client", &self.client)
            .field("handler", &self.handler)
            .field("links", &*self.links.lock())
            .field("queue_handles", &self.queue_map.len())
            .field("cached_items", &self.metadata.len())
            .field("pending", &self.pending)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn client_state_value(state: &PlaybackState, platform: &PlatformPlaybackState) -> Value {
    to_value(&ClientPlaybackState {
        processing_state: state.processing_state.into(),
        playing: state.playing,
        controls: Vec::new(),
        system_actions: ActionMask::from_bits(platform.actions),
        update_position: platform.position_ms,
        buffered_position: platform.buffered_position_ms,
        speed: platform.speed,
        update_time: platform.update_time.timestamp_millis(),
        repeat_mode: state.repeat_mode,
        shuffle_mode: state.shuffle_mode,
    })
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SessionBridge`].
#[derive(Default)]
pub struct SessionBridgeBuilder {
    config: Option<SessionConfig>,
    host: Option<Arc<dyn PlatformSessionHost>>,
    settings: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    client_transport: Option<Arc<dyn MethodTransport>>,
    handler_transport: Option<Arc<dyn MethodTransport>>,
}

impl SessionBridgeBuilder {
    /// Runtime options and initial values. Persisted fields are overridden
    /// by the settings store when one is supplied.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn PlatformSessionHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_client_transport(mut self, transport: Arc<dyn MethodTransport>) -> Self {
        self.client_transport = Some(transport);
        self
    }

    pub fn with_handler_transport(mut self, transport: Arc<dyn MethodTransport>) -> Self {
        self.handler_transport = Some(transport);
        self
    }

    /// Builds the bridge and starts its UI relay.
    ///
    /// # Errors
    ///
    /// - [`core_runtime::Error::CapabilityMissing`] without a host (unless
    ///   the `desktop-shims` feature supplies a headless one)
    /// - [`core_runtime::Error::Config`] for an invalid configuration or when
    ///   called outside a tokio runtime
    pub async fn build(self) -> Result<Arc<SessionBridge>> {
        let mut config = self.config.unwrap_or_default();
        if let Some(settings) = &self.settings {
            // `save` always writes this key, so its absence means nothing was persisted
            if settings.has_key(keys::RESUME_ON_CLICK).await? {
                let persisted = SessionConfig::load(settings.as_ref()).await?;
                config.apply_persisted(&persisted);
                debug!("Applied persisted session configuration");
            }
        }
        config.validate()?;

        let host = match self.host {
            Some(host) => host,
            None => default_host()?,
        };

        let events = Arc::new(EventBus::new(config.event_buffer_size));
        let client = Arc::new(Channel::new(ChannelKind::Client, Arc::clone(&events)));
        let handler = Arc::new(Channel::new(ChannelKind::Handler, Arc::clone(&events)));
        if let Some(transport) = self.client_transport {
            client.bind(transport);
        }
        if let Some(transport) = self.handler_transport {
            handler.bind(transport);
        }

        let relay = UiRelay::spawn(&events, Arc::clone(&client))?;

        info!(
            package = %config.package_name,
            pending_timeout = ?config.pending_result_timeout,
            "Session bridge created"
        );

        Ok(Arc::new(SessionBridge {
            pending: PendingResults::new(config.pending_result_timeout),
            lifecycle: ForegroundLifecycle::new(Arc::clone(&host), Arc::clone(&events)),
            config: RwLock::new(config),
            host,
            settings: self.settings,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            state: tokio::sync::Mutex::new(SessionState::default()),
            links: Mutex::new(Links::default()),
            queue_map: QueueIdentityMap::new(),
            metadata: MetadataCache::new(),
            client,
            handler,
            events,
            relay: Mutex::new(Some(relay)),
            destroyed: AtomicBool::new(false),
        }))
    }
}

#[cfg(feature = "desktop-shims")]
fn default_host() -> Result<Arc<dyn PlatformSessionHost>> {
    debug!("No host supplied, using headless session host");
    Ok(Arc::new(bridge_desktop::HeadlessSessionHost::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_host() -> Result<Arc<dyn PlatformSessionHost>> {
    Err(core_runtime::Error::CapabilityMissing {
        capability: "PlatformSessionHost".to_string(),
        message: "No platform session host was provided. Supply one with \
                  SessionBridgeBuilder::with_host or enable the desktop-shims feature."
            .to_string(),
    }
    .into())
}
