//! Playback State Record
//!
//! ## Overview
//!
//! [`PlaybackState`] is the single authoritative snapshot of what the
//! application is doing. It is replaced wholesale by every `setState` command
//! (never patched) so that commands arriving on different channels cannot
//! interleave partial updates.
//!
//! The platform sees a derived [`PlatformPlaybackState`]: the phase comes from
//! the fixed `(processingState, playing)` table in
//! [`AudioProcessingState::phase`], and the action bits always include
//! play/pause.

use bridge_traits::session::{PlatformError, PlaybackPhase};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Most actions a compact notification (lock screen, watch) can show.
pub const MAX_COMPACT_ACTIONS: usize = 3;

// ============================================================================
// Processing state
// ============================================================================

/// Lifecycle of the current item, independent of the play/pause flag.
///
/// Carried on the wire as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AudioProcessingState {
    #[default]
    Idle = 0,
    Loading = 1,
    Buffering = 2,
    Ready = 3,
    Completed = 4,
    Error = 5,
}

impl AudioProcessingState {
    /// Platform phase for this processing state and play flag.
    pub fn phase(self, playing: bool) -> PlaybackPhase {
        match self {
            AudioProcessingState::Idle => PlaybackPhase::None,
            AudioProcessingState::Loading => PlaybackPhase::Connecting,
            AudioProcessingState::Buffering => PlaybackPhase::Buffering,
            AudioProcessingState::Ready | AudioProcessingState::Completed => {
                if playing {
                    PlaybackPhase::Playing
                } else {
                    PlaybackPhase::Paused
                }
            }
            AudioProcessingState::Error => PlaybackPhase::Error,
        }
    }

    pub fn is_idle(self) -> bool {
        self == AudioProcessingState::Idle
    }
}

impl TryFrom<u8> for AudioProcessingState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        Ok(match value {
            0 => AudioProcessingState::Idle,
            1 => AudioProcessingState::Loading,
            2 => AudioProcessingState::Buffering,
            3 => AudioProcessingState::Ready,
            4 => AudioProcessingState::Completed,
            5 => AudioProcessingState::Error,
            other => return Err(format!("unknown processing state {}", other)),
        })
    }
}

impl From<AudioProcessingState> for u8 {
    fn from(state: AudioProcessingState) -> Self {
        state as u8
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Transport actions, numbered by their platform bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MediaAction {
    Stop = 0,
    Pause = 1,
    Play = 2,
    Rewind = 3,
    SkipToPrevious = 4,
    SkipToNext = 5,
    FastForward = 6,
    SetRating = 7,
    SeekTo = 8,
    PlayPause = 9,
    PlayFromMediaId = 10,
    PlayFromSearch = 11,
    SkipToQueueItem = 12,
    PlayFromUri = 13,
    Prepare = 14,
    PrepareFromMediaId = 15,
    PrepareFromSearch = 16,
    PrepareFromUri = 17,
    SetRepeatMode = 18,
    // 19 is a retired shuffle action the platform still reserves
    SetCaptioningEnabled = 20,
    SetShuffleMode = 21,
    SetPlaybackSpeed = 22,
}

impl MediaAction {
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl TryFrom<u8> for MediaAction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        use MediaAction::*;
        Ok(match value {
            0 => Stop,
            1 => Pause,
            2 => Play,
            3 => Rewind,
            4 => SkipToPrevious,
            5 => SkipToNext,
            6 => FastForward,
            7 => SetRating,
            8 => SeekTo,
            9 => PlayPause,
            10 => PlayFromMediaId,
            11 => PlayFromSearch,
            12 => SkipToQueueItem,
            13 => PlayFromUri,
            14 => Prepare,
            15 => PrepareFromMediaId,
            16 => PrepareFromSearch,
            17 => PrepareFromUri,
            18 => SetRepeatMode,
            20 => SetCaptioningEnabled,
            21 => SetShuffleMode,
            22 => SetPlaybackSpeed,
            other => return Err(format!("unknown media action {}", other)),
        })
    }
}

impl From<MediaAction> for u8 {
    fn from(action: MediaAction) -> Self {
        action as u8
    }
}

/// Bitset of enabled system actions.
///
/// Carried on the wire as the list of set bit positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct ActionMask(u64);

impl ActionMask {
    pub const fn empty() -> Self {
        ActionMask(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        ActionMask(bits)
    }

    pub fn with(mut self, action: MediaAction) -> Self {
        self.0 |= action.bit();
        self
    }

    pub fn contains(&self, action: MediaAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Bit positions that are set, lowest first.
    pub fn indices(&self) -> Vec<u8> {
        (0..64u8).filter(|i| self.0 & (1u64 << i) != 0).collect()
    }
}

impl FromIterator<MediaAction> for ActionMask {
    fn from_iter<T: IntoIterator<Item = MediaAction>>(iter: T) -> Self {
        iter.into_iter().fold(ActionMask::empty(), ActionMask::with)
    }
}

impl From<Vec<u8>> for ActionMask {
    fn from(indices: Vec<u8>) -> Self {
        let bits = indices
            .into_iter()
            .filter(|&i| i < 64)
            .fold(0u64, |acc, i| acc | (1u64 << i));
        ActionMask(bits)
    }
}

impl From<ActionMask> for Vec<u8> {
    fn from(mask: ActionMask) -> Self {
        mask.indices()
    }
}

/// A custom control shown on the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaControl {
    #[serde(rename = "androidIcon")]
    pub icon: String,
    pub label: String,
    pub action: MediaAction,
}

impl MediaControl {
    pub fn new(icon: impl Into<String>, label: impl Into<String>, action: MediaAction) -> Self {
        Self {
            icon: icon.into(),
            label: label.into(),
            action,
        }
    }
}

// ============================================================================
// Repeat / shuffle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum RepeatMode {
    #[default]
    None = 0,
    One = 1,
    All = 2,
    Group = 3,
}

impl TryFrom<i32> for RepeatMode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, String> {
        Ok(match value {
            0 => RepeatMode::None,
            1 => RepeatMode::One,
            2 => RepeatMode::All,
            3 => RepeatMode::Group,
            other => return Err(format!("unknown repeat mode {}", other)),
        })
    }
}

impl From<RepeatMode> for i32 {
    fn from(mode: RepeatMode) -> Self {
        mode as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum ShuffleMode {
    #[default]
    None = 0,
    All = 1,
    Group = 2,
}

impl TryFrom<i32> for ShuffleMode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, String> {
        Ok(match value {
            0 => ShuffleMode::None,
            1 => ShuffleMode::All,
            2 => ShuffleMode::Group,
            other => return Err(format!("unknown shuffle mode {}", other)),
        })
    }
}

impl From<ShuffleMode> for i32 {
    fn from(mode: ShuffleMode) -> Self {
        mode as i32
    }
}

// ============================================================================
// Playback state
// ============================================================================

/// Full playback snapshot pushed by the application.
///
/// Positions are milliseconds; `update_time` is milliseconds since the Unix
/// epoch and defaults to "now" when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub processing_state: AudioProcessingState,
    pub playing: bool,
    #[serde(default)]
    pub controls: Vec<MediaControl>,
    #[serde(default, rename = "androidCompactActionIndices")]
    pub compact_action_indices: Option<Vec<usize>>,
    #[serde(default)]
    pub system_actions: ActionMask,
    #[serde(rename = "updatePosition")]
    pub position: i64,
    pub buffered_position: i64,
    pub speed: f32,
    #[serde(default)]
    pub update_time: Option<i64>,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub repeat_mode: RepeatMode,
    pub shuffle_mode: ShuffleMode,
    #[serde(default)]
    pub captioning_enabled: bool,
    #[serde(default)]
    pub queue_index: Option<usize>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            processing_state: AudioProcessingState::Idle,
            playing: false,
            controls: Vec::new(),
            compact_action_indices: None,
            system_actions: ActionMask::empty(),
            position: 0,
            buffered_position: 0,
            speed: 1.0,
            update_time: None,
            error_code: None,
            error_message: None,
            repeat_mode: RepeatMode::None,
            shuffle_mode: ShuffleMode::None,
            captioning_enabled: false,
            queue_index: None,
        }
    }
}

impl PlaybackState {
    /// Idle, not playing, nothing queued.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Convenience constructor for tests and hosts.
    pub fn new(processing_state: AudioProcessingState, playing: bool) -> Self {
        Self {
            processing_state,
            playing,
            ..Self::default()
        }
    }

    pub fn with_controls(mut self, controls: Vec<MediaControl>) -> Self {
        self.controls = controls;
        self
    }

    pub fn with_system_actions(mut self, actions: ActionMask) -> Self {
        self.system_actions = actions;
        self
    }

    pub fn with_position(mut self, position_ms: i64) -> Self {
        self.position = position_ms;
        self
    }

    pub fn with_queue_index(mut self, index: usize) -> Self {
        self.queue_index = Some(index);
        self
    }

    pub fn with_error(mut self, code: i32, message: impl Into<String>) -> Self {
        self.error_code = Some(code);
        self.error_message = Some(message.into());
        self
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.processing_state.phase(self.playing)
    }

    pub fn is_idle(&self) -> bool {
        self.processing_state.is_idle()
    }

    /// Paused with content loaded, the state a resume-on-click press resumes from.
    pub fn is_paused(&self) -> bool {
        !self.playing
            && matches!(
                self.processing_state,
                AudioProcessingState::Ready | AudioProcessingState::Completed
            )
    }

    /// Platform action bits: play/pause, system actions, and every control's action.
    pub fn action_bits(&self) -> u64 {
        self.controls
            .iter()
            .fold(MediaAction::PlayPause.bit() | self.system_actions.bits(), |acc, c| {
                acc | c.action.bit()
            })
    }

    /// Compact indices to show, clamped to [`MAX_COMPACT_ACTIONS`] and to the
    /// controls that exist. Defaults to the leading controls.
    pub fn effective_compact_indices(&self) -> Vec<usize> {
        match &self.compact_action_indices {
            Some(indices) => indices
                .iter()
                .copied()
                .filter(|&i| i < self.controls.len())
                .take(MAX_COMPACT_ACTIONS)
                .collect(),
            None => (0..self.controls.len().min(MAX_COMPACT_ACTIONS)).collect(),
        }
    }

    /// Error for the platform descriptor.
    pub fn platform_error(&self) -> Option<PlatformError> {
        match (self.error_code, &self.error_message) {
            (None, None) => None,
            (code, message) => Some(PlatformError {
                code: code.unwrap_or(0),
                message: message.clone(),
            }),
        }
    }

    /// Enforces "error is only set in the error state".
    ///
    /// A stray error on a non-error state is dropped with a warning rather
    /// than rejected, so a sloppy snapshot still reaches the platform.
    pub fn normalized(mut self) -> Self {
        if self.processing_state != AudioProcessingState::Error
            && (self.error_code.is_some() || self.error_message.is_some())
        {
            warn!(
                processing_state = ?self.processing_state,
                error_code = ?self.error_code,
                "Dropping error carried by a non-error playback state"
            );
            self.error_code = None;
            self.error_message = None;
        }
        if !self.speed.is_finite() {
            warn!(speed = self.speed, "Non-finite speed, using 1.0");
            self.speed = 1.0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_mapping_table() {
        use AudioProcessingState::*;
        assert_eq!(Idle.phase(false), PlaybackPhase::None);
        assert_eq!(Idle.phase(true), PlaybackPhase::None);
        assert_eq!(Loading.phase(true), PlaybackPhase::Connecting);
        assert_eq!(Buffering.phase(false), PlaybackPhase::Buffering);
        assert_eq!(Ready.phase(true), PlaybackPhase::Playing);
        assert_eq!(Ready.phase(false), PlaybackPhase::Paused);
        assert_eq!(Completed.phase(true), PlaybackPhase::Playing);
        assert_eq!(Completed.phase(false), PlaybackPhase::Paused);
        assert_eq!(Error.phase(true), PlaybackPhase::Error);
    }

    #[test]
    fn test_action_bits_always_include_play_pause() {
        let state = PlaybackState::idle();
        assert_eq!(state.action_bits(), MediaAction::PlayPause.bit());

        let state = PlaybackState::new(AudioProcessingState::Ready, true)
            .with_system_actions([MediaAction::SeekTo].into_iter().collect())
            .with_controls(vec![MediaControl::new(
                "drawable/ic_skip_next",
                "Next",
                MediaAction::SkipToNext,
            )]);
        let bits = state.action_bits();
        assert_ne!(bits & MediaAction::PlayPause.bit(), 0);
        assert_ne!(bits & MediaAction::SeekTo.bit(), 0);
        assert_ne!(bits & MediaAction::SkipToNext.bit(), 0);
        assert_eq!(bits & MediaAction::Stop.bit(), 0);
    }

    #[test]
    fn test_compact_indices() {
        let controls: Vec<MediaControl> = [
            MediaAction::SkipToPrevious,
            MediaAction::Pause,
            MediaAction::SkipToNext,
            MediaAction::Stop,
        ]
        .into_iter()
        .map(|a| MediaControl::new("icon", format!("{:?}", a), a))
        .collect();

        let mut state = PlaybackState::new(AudioProcessingState::Ready, true).with_controls(controls);
        assert_eq!(state.effective_compact_indices(), vec![0, 1, 2]);

        state.compact_action_indices = Some(vec![3, 9, 1, 0, 2]);
        assert_eq!(state.effective_compact_indices(), vec![3, 1, 0]);

        state.controls.truncate(1);
        state.compact_action_indices = None;
        assert_eq!(state.effective_compact_indices(), vec![0]);
    }

    #[test]
    fn test_normalized_drops_stray_error() {
        let state = PlaybackState::new(AudioProcessingState::Ready, false)
            .with_error(3, "network")
            .normalized();
        assert_eq!(state.platform_error(), None);

        let state = PlaybackState::new(AudioProcessingState::Error, false)
            .with_error(3, "network")
            .normalized();
        assert_eq!(
            state.platform_error(),
            Some(PlatformError {
                code: 3,
                message: Some("network".to_string())
            })
        );
    }

    #[test]
    fn test_wire_decoding() {
        let state: PlaybackState = serde_json::from_value(json!({
            "processingState": 3,
            "playing": true,
            "controls": [{"androidIcon": "drawable/ic_pause", "label": "Pause", "action": 1}],
            "androidCompactActionIndices": [0],
            "systemActions": [8, 12],
            "updatePosition": 1500,
            "bufferedPosition": 9000,
            "speed": 1.0,
            "updateTime": 1700000000000i64,
            "repeatMode": 2,
            "shuffleMode": 0,
            "captioningEnabled": false,
            "queueIndex": 1
        }))
        .unwrap();

        assert_eq!(state.processing_state, AudioProcessingState::Ready);
        assert_eq!(state.controls[0].action, MediaAction::Pause);
        assert!(state.system_actions.contains(MediaAction::SeekTo));
        assert!(state.system_actions.contains(MediaAction::SkipToQueueItem));
        assert_eq!(state.position, 1500);
        assert_eq!(state.repeat_mode, RepeatMode::All);
        assert_eq!(state.queue_index, Some(1));
    }

    #[test]
    fn test_wire_requires_full_snapshot() {
        let partial = serde_json::from_value::<PlaybackState>(json!({
            "processingState": 3,
            "playing": true
        }));
        assert!(partial.is_err());
    }

    #[test]
    fn test_unknown_ordinals_rejected() {
        assert!(AudioProcessingState::try_from(6).is_err());
        assert!(MediaAction::try_from(19).is_err());
        assert!(RepeatMode::try_from(-1).is_err());
    }

    #[test]
    fn test_action_mask_indices() {
        let mask = ActionMask::from(vec![0, 9, 63, 200]);
        assert_eq!(mask.indices(), vec![0, 9, 63]);
        assert!(mask.contains(MediaAction::PlayPause));
    }
}
