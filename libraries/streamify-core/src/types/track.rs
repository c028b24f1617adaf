/// Track types
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Where a track comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    #[default]
    Youtube,
    Spotify,
    Soundcloud,
    Twitch,
    Bandcamp,
    Http,
    Local,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Youtube => "youtube",
            TrackSource::Spotify => "spotify",
            TrackSource::Soundcloud => "soundcloud",
            TrackSource::Twitch => "twitch",
            TrackSource::Bandcamp => "bandcamp",
            TrackSource::Http => "http",
            TrackSource::Local => "local",
        }
    }

    /// Sources that are ultimately extracted from YouTube
    ///
    /// Spotify tracks carry no audio of their own and are resolved to a
    /// YouTube id before extraction.
    pub fn is_youtube_family(&self) -> bool {
        matches!(self, TrackSource::Youtube | TrackSource::Spotify)
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable source item
///
/// Immutable once fetched, except for the cross-source resolved id which may
/// be attached exactly once. Clones share the resolution slot, so resolving a
/// queued copy also resolves the one held by the player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// `None` or zero means indeterminate length (live)
    #[serde(default)]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub source: TrackSource,
    #[serde(default)]
    pub uri: Option<String>,
    /// Direct stream endpoint (SoundCloud API url)
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub is_autoplay: bool,

    #[serde(skip)]
    resolved_id: Arc<OnceLock<String>>,
}

impl Track {
    /// Create a new track with the minimum identity
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: TrackSource) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source,
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requested_by = Some(requester.into());
        self
    }

    pub fn live(mut self) -> Self {
        self.is_live = true;
        self
    }

    /// Live streams and tracks without a known length
    pub fn is_indeterminate(&self) -> bool {
        self.is_live || self.duration.map_or(true, |d| d.is_zero())
    }

    /// Duration in milliseconds, zero when indeterminate
    pub fn duration_ms(&self) -> u64 {
        self.duration.map_or(0, |d| d.as_millis() as u64)
    }

    pub fn resolved_id(&self) -> Option<&str> {
        self.resolved_id.get().map(String::as_str)
    }

    /// Attach the cross-source id
    ///
    /// Returns `false` if an id was already attached; the first one wins.
    pub fn set_resolved_id(&self, id: impl Into<String>) -> bool {
        self.resolved_id.set(id.into()).is_ok()
    }

    /// Whether extraction needs a cross-source id first
    pub fn needs_resolution(&self) -> bool {
        self.source == TrackSource::Spotify && self.resolved_id.get().is_none()
    }

    /// The id the extractor should use
    ///
    /// Returns `None` when there is nothing usable, such as an empty id or
    /// an unresolved Spotify track.
    pub fn playable_id(&self) -> Option<&str> {
        let id = match self.source {
            TrackSource::Spotify => self.resolved_id()?,
            _ => self.resolved_id().unwrap_or(&self.id),
        };
        let id = id.trim();
        (!id.is_empty() && id != "undefined").then_some(id)
    }

    pub fn is_local(&self) -> bool {
        self.source == TrackSource::Local || self.local_path.is_some()
    }
}
