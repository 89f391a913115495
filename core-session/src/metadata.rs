//! Media items and the Metadata Cache
//!
//! ## Overview
//!
//! [`MetadataCache`] keeps the last-known [`MediaItem`] for every media id the
//! application has mentioned (queue pushes, now-playing item, browse and
//! search results). Platform callbacks read it synchronously; they cannot
//! wait for a channel round trip. Entries are never evicted while the bridge
//! lives.
//!
//! A miss is not an error. Callers use [`MetadataCache::get_or_stub`], which
//! falls back to [`MediaItem::stub`], because the platform may reference an id
//! the application has not described yet (a browse query racing a queue
//! replace, for instance).

use std::collections::HashMap;

use bridge_traits::session::MediaDescription;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

// ============================================================================
// Rating
// ============================================================================

/// Rating style, numbered as the platform numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RatingStyle {
    None = 0,
    Heart = 1,
    ThumbUpDown = 2,
    ThreeStars = 3,
    FourStars = 4,
    FiveStars = 5,
    Percentage = 6,
}

impl TryFrom<u8> for RatingStyle {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => RatingStyle::None,
            1 => RatingStyle::Heart,
            2 => RatingStyle::ThumbUpDown,
            3 => RatingStyle::ThreeStars,
            4 => RatingStyle::FourStars,
            5 => RatingStyle::FiveStars,
            6 => RatingStyle::Percentage,
            other => return Err(format!("unknown rating style {}", other)),
        })
    }
}

impl RatingStyle {
    fn max_stars(self) -> Option<f64> {
        match self {
            RatingStyle::ThreeStars => Some(3.0),
            RatingStyle::FourStars => Some(4.0),
            RatingStyle::FiveStars => Some(5.0),
            _ => None,
        }
    }
}

/// A user rating.
///
/// Wire form is `{"type": <style>, "value": <bool | number | null>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRating", into = "RawRating")]
pub enum Rating {
    Unrated(RatingStyle),
    Heart(bool),
    Thumb(bool),
    Stars { style: RatingStyle, value: f64 },
    Percentage(f64),
}

impl Rating {
    pub fn style(&self) -> RatingStyle {
        match self {
            Rating::Unrated(style) => *style,
            Rating::Heart(_) => RatingStyle::Heart,
            Rating::Thumb(_) => RatingStyle::ThumbUpDown,
            Rating::Stars { style, .. } => *style,
            Rating::Percentage(_) => RatingStyle::Percentage,
        }
    }

    pub fn is_rated(&self) -> bool {
        !matches!(self, Rating::Unrated(_))
    }
}

#[derive(Serialize, Deserialize)]
struct RawRating {
    #[serde(rename = "type")]
    style: u8,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawRating> for Rating {
    type Error = String;

    fn try_from(raw: RawRating) -> Result<Self, Self::Error> {
        let style = RatingStyle::try_from(raw.style)?;
        if raw.value.is_null() {
            return Ok(Rating::Unrated(style));
        }

        let expect_bool = || {
            raw.value
                .as_bool()
                .ok_or_else(|| format!("rating style {:?} expects a boolean", style))
        };
        let expect_number = || {
            raw.value
                .as_f64()
                .ok_or_else(|| format!("rating style {:?} expects a number", style))
        };

        match style {
            RatingStyle::None => Ok(Rating::Unrated(style)),
            RatingStyle::Heart => Ok(Rating::Heart(expect_bool()?)),
            RatingStyle::ThumbUpDown => Ok(Rating::Thumb(expect_bool()?)),
            RatingStyle::Percentage => {
                let value = expect_number()?;
                if !(0.0..=100.0).contains(&value) {
                    return Err(format!("percentage rating out of range: {}", value));
                }
                Ok(Rating::Percentage(value))
            }
            RatingStyle::ThreeStars | RatingStyle::FourStars | RatingStyle::FiveStars => {
                let value = expect_number()?;
                let max = style.max_stars().unwrap_or(5.0);
                if !(0.0..=max).contains(&value) {
                    return Err(format!("{} star rating out of range: {}", max, value));
                }
                Ok(Rating::Stars { style, value })
            }
        }
    }
}

impl From<Rating> for RawRating {
    fn from(rating: Rating) -> Self {
        let style = rating.style() as u8;
        let value = match rating {
            Rating::Unrated(_) => Value::Null,
            Rating::Heart(v) | Rating::Thumb(v) => Value::Bool(v),
            Rating::Stars { value, .. } | Rating::Percentage(value) => Value::from(value),
        };
        RawRating { style, value }
    }
}

// ============================================================================
// Media Item
// ============================================================================

/// Descriptive record for one media id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Application-chosen media id
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_uri: Option<String>,
    /// `false` marks a browsable folder rather than something playable
    #[serde(default)]
    pub playable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Map<String, Value>>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Minimal record for an id the application has not described.
    pub fn stub(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration_ms(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_playable(mut self, playable: bool) -> Self {
        self.playable = Some(playable);
        self
    }

    /// Items are playable unless explicitly marked otherwise.
    pub fn is_playable(&self) -> bool {
        self.playable.unwrap_or(true)
    }

    /// Platform description: display fields win over their plain counterparts.
    pub fn to_description(&self) -> MediaDescription {
        MediaDescription {
            media_id: self.id.clone(),
            title: self
                .display_title
                .clone()
                .unwrap_or_else(|| self.title.clone()),
            subtitle: self
                .display_subtitle
                .clone()
                .or_else(|| self.artist.clone()),
            description: self
                .display_description
                .clone()
                .or_else(|| self.album.clone()),
            icon_uri: self.art_uri.clone(),
            duration_ms: self.duration,
            playable: self.is_playable(),
            extras: self.extras.clone(),
        }
    }

    /// Best-effort item from a description the platform handed back.
    pub fn from_description(description: &MediaDescription) -> Self {
        Self {
            id: description.media_id.clone(),
            title: description.title.clone(),
            artist: description.subtitle.clone(),
            album: description.description.clone(),
            duration: description.duration_ms,
            art_uri: description.icon_uri.clone(),
            playable: Some(description.playable),
            extras: description.extras.clone(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Metadata Cache
// ============================================================================

/// Process-wide `media id -> MediaItem` store.
#[derive(Debug, Default)]
pub struct MetadataCache {
    items: RwLock<HashMap<String, MediaItem>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `item`, last write wins.
    pub fn put(&self, item: MediaItem) {
        debug!(media_id = %item.id, "Caching media item");
        self.items.write().insert(item.id.clone(), item);
    }

    pub fn put_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = MediaItem>,
    {
        let mut guard = self.items.write();
        for item in items {
            guard.insert(item.id.clone(), item);
        }
    }

    pub fn get(&self, media_id: &str) -> Option<MediaItem> {
        self.items.read().get(media_id).cloned()
    }

    /// Cached item or a minimal stub.
    pub fn get_or_stub(&self, media_id: &str) -> MediaItem {
        match self.get(media_id) {
            Some(item) => item,
            None => {
                debug!(media_id, "Metadata cache miss, using stub");
                MediaItem::stub(media_id)
            }
        }
    }

    pub fn contains(&self, media_id: &str) -> bool {
        self.items.read().contains_key(media_id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Only called on bridge teardown.
    pub fn clear(&self) {
        self.items.write().clear();
    }
}
