//! Typed Channel Messages
//!
//! ## Overview
//!
//! Every name that crosses a channel is an enum variant here. Inbound calls
//! are decoded once at the edge ([`HandlerCommand::decode`],
//! [`ClientCommand::decode`]) and everything past that point matches on
//! variants, so adding a method is a compile error until every dispatch table
//! handles it. Outbound variants render themselves back to a [`MethodCall`].
//!
//! ## Wire conventions
//!
//! - Arguments are a JSON object; a missing or `null` payload reads as `{}`
//! - Positions are milliseconds on the platform side and microseconds on the
//!   application side (`seekTo`)
//! - Media items use the camelCase keys of [`MediaItem`]

use bridge_traits::channel::MethodCall;
use bridge_traits::session::{MediaDescription, PlaybackInfo};
use core_runtime::SessionConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Result, SessionError};
use crate::metadata::{MediaItem, Rating};
use crate::state::{ActionMask, MediaControl, PlaybackState, RepeatMode, ShuffleMode};

pub type Extras = Option<Map<String, Value>>;

fn arguments<T: DeserializeOwned>(call: &MethodCall) -> Result<T> {
    let raw = match &call.arguments {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(raw).map_err(|source| SessionError::Decode {
        method: call.method.clone(),
        source,
    })
}

// ============================================================================
// Background channel, inbound
// ============================================================================

/// Commands the application sends on the background channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerCommand {
    SetMediaItem(MediaItem),
    SetQueue(Vec<MediaItem>),
    SetState(PlaybackState),
    SetPlaybackInfo(PlaybackInfo),
    NotifyChildrenChanged {
        parent_media_id: String,
        options: Extras,
    },
    StopService,
    /// The background context is listening
    Ready,
    /// The background context began running its handler
    Started,
    /// The background context finished shutting down
    Stopped,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItemArgs {
    media_item: MediaItem,
}

#[derive(Deserialize)]
struct QueueArgs {
    #[serde(default)]
    queue: Vec<MediaItem>,
}

#[derive(Deserialize)]
struct StateArgs {
    state: PlaybackState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackInfoArgs {
    playback_info: PlaybackInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildrenChangedArgs {
    parent_media_id: String,
    #[serde(default)]
    options: Extras,
}

impl HandlerCommand {
    pub fn decode(call: &MethodCall) -> Result<Self> {
        Ok(match call.method.as_str() {
            "setMediaItem" => {
                HandlerCommand::SetMediaItem(arguments::<MediaItemArgs>(call)?.media_item)
            }
            "setQueue" => HandlerCommand::SetQueue(arguments::<QueueArgs>(call)?.queue),
            "setState" => HandlerCommand::SetState(arguments::<StateArgs>(call)?.state),
            "setAndroidPlaybackInfo" | "setPlaybackInfo" => HandlerCommand::SetPlaybackInfo(
                arguments::<PlaybackInfoArgs>(call)?.playback_info,
            ),
            "notifyChildrenChanged" => {
                let args: ChildrenChangedArgs = arguments(call)?;
                HandlerCommand::NotifyChildrenChanged {
                    parent_media_id: args.parent_media_id,
                    options: args.options,
                }
            }
            "stopService" => HandlerCommand::StopService,
            "ready" => HandlerCommand::Ready,
            "started" => HandlerCommand::Started,
            "stopped" => HandlerCommand::Stopped,
            other => return Err(SessionError::UnknownMethod(other.to_string())),
        })
    }

    pub fn method(&self) -> &'static str {
        match self {
            HandlerCommand::SetMediaItem(_) => "setMediaItem",
            HandlerCommand::SetQueue(_) => "setQueue",
            HandlerCommand::SetState(_) => "setState",
            HandlerCommand::SetPlaybackInfo(_) => "setPlaybackInfo",
            HandlerCommand::NotifyChildrenChanged { .. } => "notifyChildrenChanged",
            HandlerCommand::StopService => "stopService",
            HandlerCommand::Ready => "ready",
            HandlerCommand::Started => "started",
            HandlerCommand::Stopped => "stopped",
        }
    }
}

// ============================================================================
// Background channel, outbound
// ============================================================================

/// Buttons a media key press is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum MediaButton {
    Media = 0,
    Next = 1,
    Previous = 2,
}

impl From<MediaButton> for u8 {
    fn from(button: MediaButton) -> Self {
        button as u8
    }
}

/// Events forwarded to the application on the background channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerEvent {
    Play,
    Pause,
    Stop,
    Prepare,
    PrepareFromMediaId { media_id: String, extras: Extras },
    PrepareFromSearch { query: String, extras: Extras },
    PrepareFromUri { uri: String, extras: Extras },
    PlayFromMediaId { media_id: String, extras: Extras },
    PlayFromSearch { query: String, extras: Extras },
    PlayFromUri { uri: String, extras: Extras },
    PlayMediaItem(MediaItem),
    /// Position in microseconds
    SeekTo { position_us: i64 },
    SkipToNext,
    SkipToPrevious,
    SkipToQueueItem { media_id: String },
    FastForward,
    Rewind,
    SetRating { rating: Rating, extras: Extras },
    SetRepeatMode(RepeatMode),
    SetShuffleMode(ShuffleMode),
    SetCaptioningEnabled(bool),
    SetSpeed(f32),
    CustomAction { name: String, extras: Extras },
    AddQueueItem(MediaItem),
    InsertQueueItem { media_item: MediaItem, index: usize },
    RemoveQueueItem(MediaItem),
    RemoveQueueItemAt(usize),
    SetVolumeTo(i32),
    AdjustVolume(i32),
    Click(MediaButton),
    TaskRemoved,
    NotificationDeleted,
}

impl HandlerEvent {
    pub fn method(&self) -> &'static str {
        use HandlerEvent::*;
        match self {
            Play => "play",
            Pause => "pause",
            Stop => "stop",
            Prepare => "prepare",
            PrepareFromMediaId { .. } => "prepareFromMediaId",
            PrepareFromSearch { .. } => "prepareFromSearch",
            PrepareFromUri { .. } => "prepareFromUri",
            PlayFromMediaId { .. } => "playFromMediaId",
            PlayFromSearch { .. } => "playFromSearch",
            PlayFromUri { .. } => "playFromUri",
            PlayMediaItem(_) => "playMediaItem",
            SeekTo { .. } => "seekTo",
            SkipToNext => "skipToNext",
            SkipToPrevious => "skipToPrevious",
            SkipToQueueItem { .. } => "skipToQueueItem",
            FastForward => "fastForward",
            Rewind => "rewind",
            SetRating { .. } => "setRating",
            SetRepeatMode(_) => "setRepeatMode",
            SetShuffleMode(_) => "setShuffleMode",
            SetCaptioningEnabled(_) => "setCaptioningEnabled",
            SetSpeed(_) => "setSpeed",
            CustomAction { .. } => "onCustomAction",
            AddQueueItem(_) => "addQueueItem",
            InsertQueueItem { .. } => "insertQueueItem",
            RemoveQueueItem(_) => "removeQueueItem",
            RemoveQueueItemAt(_) => "removeQueueItemAt",
            SetVolumeTo(_) => "setVolumeTo",
            AdjustVolume(_) => "adjustVolume",
            Click(_) => "click",
            TaskRemoved => "onTaskRemoved",
            NotificationDeleted => "onNotificationDeleted",
        }
    }

    pub fn to_call(&self) -> MethodCall {
        use HandlerEvent::*;
        let arguments = match self {
            PrepareFromMediaId { media_id, extras } | PlayFromMediaId { media_id, extras } => {
                json!({ "mediaId": media_id, "extras": extras })
            }
            PrepareFromSearch { query, extras } | PlayFromSearch { query, extras } => {
                json!({ "query": query, "extras": extras })
            }
            PrepareFromUri { uri, extras } | PlayFromUri { uri, extras } => {
                json!({ "uri": uri, "extras": extras })
            }
            PlayMediaItem(item) | AddQueueItem(item) | RemoveQueueItem(item) => {
                json!({ "mediaItem": item })
            }
            InsertQueueItem { media_item, index } => {
                json!({ "mediaItem": media_item, "index": index })
            }
            SeekTo { position_us } => json!({ "position": position_us }),
            SkipToQueueItem { media_id } => json!({ "mediaId": media_id }),
            SetRating { rating, extras } => json!({ "rating": rating, "extras": extras }),
            SetRepeatMode(mode) => json!({ "repeatMode": mode }),
            SetShuffleMode(mode) => json!({ "shuffleMode": mode }),
            SetCaptioningEnabled(enabled) => json!({ "enabled": enabled }),
            SetSpeed(speed) => json!({ "speed": speed }),
            CustomAction { name, extras } => json!({ "name": name, "extras": extras }),
            RemoveQueueItemAt(index) => json!({ "index": index }),
            SetVolumeTo(volume_index) => json!({ "volumeIndex": volume_index }),
            AdjustVolume(direction) => json!({ "direction": direction }),
            Click(button) => json!({ "button": button }),
            Play | Pause | Stop | Prepare | SkipToNext | SkipToPrevious | FastForward | Rewind
            | TaskRemoved | NotificationDeleted => json!({}),
        };
        MethodCall::new(self.method(), arguments)
    }
}

/// Queries that expect the application to answer.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerQuery {
    GetChildren {
        parent_media_id: String,
        options: Extras,
    },
    GetMediaItem {
        media_id: String,
    },
    Search {
        query: String,
        extras: Extras,
    },
}

impl HandlerQuery {
    pub fn to_call(&self) -> MethodCall {
        match self {
            HandlerQuery::GetChildren {
                parent_media_id,
                options,
            } => MethodCall::new(
                "getChildren",
                json!({ "parentMediaId": parent_media_id, "options": options }),
            ),
            HandlerQuery::GetMediaItem { media_id } => {
                MethodCall::new("getMediaItem", json!({ "mediaId": media_id }))
            }
            HandlerQuery::Search { query, extras } => {
                MethodCall::new("onSearch", json!({ "query": query, "extras": extras }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChildrenReply {
    #[serde(default)]
    pub children: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaItemReply {
    #[serde(default)]
    pub media_item: Option<MediaItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchReply {
    #[serde(default)]
    pub media_items: Vec<MediaItem>,
}

pub(crate) fn decode_reply<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| SessionError::Decode {
        method: method.to_string(),
        source,
    })
}

// ============================================================================
// UI channel
// ============================================================================

/// Commands the UI sends on the client channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Configure(Box<SessionConfig>),
    Connect,
    Disconnect,
    Start,
    Stop,
    IsRunning,
}

#[derive(Deserialize)]
struct ConfigureArgs {
    #[serde(default)]
    config: Value,
}

impl ClientCommand {
    pub fn decode(call: &MethodCall) -> Result<Self> {
        Ok(match call.method.as_str() {
            "configure" => {
                let args: ConfigureArgs = arguments(call)?;
                let raw = match args.config {
                    Value::Null => Value::Object(Map::new()),
                    other => other,
                };
                ClientCommand::Configure(Box::new(SessionConfig::from_wire(raw)?))
            }
            "connect" => ClientCommand::Connect,
            "disconnect" => ClientCommand::Disconnect,
            "start" => ClientCommand::Start,
            "stop" => ClientCommand::Stop,
            "isRunning" => ClientCommand::IsRunning,
            other => return Err(SessionError::UnknownMethod(other.to_string())),
        })
    }
}

/// Playback snapshot as the UI sees it, rebuilt from the platform descriptor.
///
/// Custom controls are not mirrored back; `systemActions` lists every enabled
/// platform action bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPlaybackState {
    pub processing_state: u8,
    pub playing: bool,
    pub controls: Vec<MediaControl>,
    pub system_actions: ActionMask,
    pub update_position: i64,
    pub buffered_position: i64,
    pub speed: f32,
    /// Milliseconds since the Unix epoch
    pub update_time: i64,
    pub repeat_mode: RepeatMode,
    pub shuffle_mode: ShuffleMode,
}

/// Notifications relayed to the UI channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PlaybackStateChanged(Value),
    MediaItemChanged(Value),
    QueueChanged(Value),
}

impl ClientEvent {
    pub fn to_call(&self) -> MethodCall {
        match self {
            ClientEvent::PlaybackStateChanged(state) => {
                MethodCall::new("onPlaybackStateChanged", json!({ "state": state }))
            }
            ClientEvent::MediaItemChanged(item) => {
                MethodCall::new("onMediaItemChanged", json!({ "mediaItem": item }))
            }
            ClientEvent::QueueChanged(queue) => {
                MethodCall::new("onQueueChanged", json!({ "queue": queue }))
            }
        }
    }
}

// ============================================================================
// Platform callbacks
// ============================================================================

/// Transport control callbacks the platform session delivers.
///
/// Positions are milliseconds; volume requests only arrive for remote
/// playback. Items arrive as the platform's own description and are resolved
/// against the metadata cache.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportControl {
    Play,
    Pause,
    Stop,
    Prepare,
    PrepareFromMediaId { media_id: String, extras: Extras },
    PrepareFromSearch { query: String, extras: Extras },
    PrepareFromUri { uri: String, extras: Extras },
    PlayFromMediaId { media_id: String, extras: Extras },
    PlayFromSearch { query: String, extras: Extras },
    PlayFromUri { uri: String, extras: Extras },
    PlayMediaItem(MediaDescription),
    SeekTo { position_ms: i64 },
    SkipToNext,
    SkipToPrevious,
    /// Platform queue handle, resolved back to a media id
    SkipToQueueItem(i64),
    FastForward,
    Rewind,
    SetRating { rating: Rating, extras: Extras },
    SetRepeatMode(RepeatMode),
    SetShuffleMode(ShuffleMode),
    SetCaptioningEnabled(bool),
    SetSpeed(f32),
    CustomAction { name: String, extras: Extras },
    AddQueueItem(MediaDescription),
    InsertQueueItem {
        description: MediaDescription,
        index: usize,
    },
    RemoveQueueItem(MediaDescription),
    RemoveQueueItemAt(usize),
    SetVolumeTo(i32),
    AdjustVolume(i32),
}

/// Hardware media keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Play,
    Pause,
    PlayPause,
    HeadsetHook,
    Next,
    Previous,
    Stop,
    FastForward,
    Rewind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AudioProcessingState;

    #[test]
    fn test_decode_set_queue() {
        let call = MethodCall::new(
            "setQueue",
            json!({"queue": [{"id": "a", "title": "A"}, {"id": "b", "title": "B"}]}),
        );
        match HandlerCommand::decode(&call).unwrap() {
            HandlerCommand::SetQueue(items) => {
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_set_state() {
        let call = MethodCall::new(
            "setState",
            json!({"state": {
                "processingState": 3,
                "playing": true,
                "updatePosition": 0,
                "bufferedPosition": 0,
                "speed": 1.0,
                "repeatMode": 0,
                "shuffleMode": 0
            }}),
        );
        let HandlerCommand::SetState(state) = HandlerCommand::decode(&call).unwrap() else {
            panic!("expected setState");
        };
        assert_eq!(state.processing_state, AudioProcessingState::Ready);
        assert!(state.playing);
    }

    #[test]
    fn test_decode_null_arguments() {
        let call = MethodCall::new("stopService", Value::Null);
        assert_eq!(HandlerCommand::decode(&call).unwrap(), HandlerCommand::StopService);

        let call = MethodCall::new("setQueue", Value::Null);
        assert_eq!(HandlerCommand::decode(&call).unwrap(), HandlerCommand::SetQueue(vec![]));
    }

    #[test]
    fn test_decode_errors() {
        let call = MethodCall::new("setMediaItem", json!({"mediaItem": {"title": "no id"}}));
        assert!(matches!(
            HandlerCommand::decode(&call),
            Err(SessionError::Decode { method, .. }) if method == "setMediaItem"
        ));

        let call = MethodCall::bare("androidForceEnableMediaButtons");
        assert!(matches!(
            HandlerCommand::decode(&call),
            Err(SessionError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_decode_playback_info() {
        let call = MethodCall::new(
            "setAndroidPlaybackInfo",
            json!({"playbackInfo": {
                "playbackType": "remote",
                "volumeControlType": 2,
                "maxVolume": 10,
                "volume": 4
            }}),
        );
        assert_eq!(
            HandlerCommand::decode(&call).unwrap(),
            HandlerCommand::SetPlaybackInfo(PlaybackInfo::Remote {
                volume_control_type: 2,
                max_volume: 10,
                volume: 4
            })
        );
    }

    #[test]
    fn test_event_wire_format() {
        assert_eq!(
            HandlerEvent::SeekTo { position_us: 5_000_000 }.to_call(),
            MethodCall::new("seekTo", json!({"position": 5_000_000}))
        );
        assert_eq!(
            HandlerEvent::SkipToQueueItem {
                media_id: "trackC".to_string()
            }
            .to_call(),
            MethodCall::new("skipToQueueItem", json!({"mediaId": "trackC"}))
        );
        assert_eq!(
            HandlerEvent::Click(MediaButton::Next).to_call(),
            MethodCall::new("click", json!({"button": 1}))
        );
        assert_eq!(
            HandlerEvent::SetRepeatMode(RepeatMode::All).to_call(),
            MethodCall::new("setRepeatMode", json!({"repeatMode": 2}))
        );
        assert_eq!(HandlerEvent::Play.to_call(), MethodCall::bare("play"));
        assert_eq!(
            HandlerEvent::TaskRemoved.to_call().method,
            "onTaskRemoved"
        );
    }

    #[test]
    fn test_decode_configure() {
        let call = MethodCall::new(
            "configure",
            json!({"config": {"androidResumeOnClick": false, "notificationColor": 255}}),
        );
        let ClientCommand::Configure(config) = ClientCommand::decode(&call).unwrap() else {
            panic!("expected configure");
        };
        assert!(!config.resume_on_click);
        assert_eq!(config.notification_color, 255);

        let invalid = MethodCall::new(
            "configure",
            json!({"config": {"androidNotificationOngoing": true, "androidStopForegroundOnPause": false}}),
        );
        assert!(matches!(
            ClientCommand::decode(&invalid),
            Err(SessionError::Runtime(_))
        ));
    }
}
