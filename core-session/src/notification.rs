//! Builds the platform notification description from the current state.
//!
//! Visual construction is the host's job; this only decides what goes on it.

use bridge_traits::session::{NotificationAction, NotificationSpec, NOTIFICATION_ID};
use core_runtime::SessionConfig;

use crate::metadata::MediaItem;
use crate::state::PlaybackState;

pub fn build_notification(
    config: &SessionConfig,
    item: Option<&MediaItem>,
    state: &PlaybackState,
) -> NotificationSpec {
    let description = item.map(MediaItem::to_description);

    NotificationSpec {
        id: NOTIFICATION_ID,
        channel_id: config.resolved_channel_id(),
        channel_name: config.notification_channel_name.clone(),
        channel_description: config.notification_channel_description.clone(),
        title: description.as_ref().map(|d| d.title.clone()),
        subtitle: description.and_then(|d| d.subtitle),
        icon: config.notification_icon.clone(),
        color: config.notification_color(),
        ongoing: config.notification_ongoing,
        show_badge: config.show_notification_badge,
        click_starts_activity: config.notification_click_starts_activity,
        activity_class_name: config.activity_class_name.clone(),
        actions: state
            .controls
            .iter()
            .map(|control| NotificationAction {
                icon: control.icon.clone(),
                label: control.label.clone(),
                action: control.action.bit(),
            })
            .collect(),
        compact_action_indices: state.effective_compact_indices(),
        playing: state.playing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AudioProcessingState, MediaAction, MediaControl};

    #[test]
    fn test_notification_reflects_item_and_controls() {
        let config = SessionConfig::builder()
            .notification_channel_name("Playback")
            .notification_color(0xFF2196F3)
            .build()
            .unwrap();
        let item = MediaItem::new("trackA", "Song A").with_artist("Artist");
        let state = PlaybackState::new(AudioProcessingState::Ready, true).with_controls(vec![
            MediaControl::new("drawable/ic_pause", "Pause", MediaAction::Pause),
            MediaControl::new("drawable/ic_stop", "Stop", MediaAction::Stop),
        ]);

        let spec = build_notification(&config, Some(&item), &state);

        assert_eq!(spec.id, NOTIFICATION_ID);
        assert_eq!(spec.channel_id, "session_bridge.channel");
        assert_eq!(spec.channel_name.as_deref(), Some("Playback"));
        assert_eq!(spec.title.as_deref(), Some("Song A"));
        assert_eq!(spec.subtitle.as_deref(), Some("Artist"));
        assert_eq!(spec.color, Some(0xFF2196F3));
        assert!(spec.playing);
        assert_eq!(spec.actions.len(), 2);
        assert_eq!(spec.actions[0].action, MediaAction::Pause.bit());
        assert_eq!(spec.compact_action_indices, vec![0, 1]);
    }

    #[test]
    fn test_notification_without_item() {
        let config = SessionConfig::default();
        let spec = build_notification(&config, None, &PlaybackState::idle());
        assert_eq!(spec.title, None);
        assert_eq!(spec.color, None);
        assert!(!spec.playing);
        assert!(spec.actions.is_empty());
    }
}
