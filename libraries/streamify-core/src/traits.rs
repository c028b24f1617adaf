/// Collaborator traits for Streamify
///
/// The playback core never searches catalogs or talks to a chat gateway
/// itself. These seams are how it reaches the services that do.
use crate::error::Result;
use crate::types::Track;
use async_trait::async_trait;

/// Resolves a track from an unplayable source into an extractable id
///
/// Called at pipeline build time for tracks where
/// [`Track::needs_resolution`] is true (Spotify tracks resolve to YouTube).
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Return the extractable id for `track`
    ///
    /// # Errors
    /// Returns [`CoreError::Resolution`](crate::CoreError::Resolution) if no
    /// match can be found
    async fn resolve(&self, track: &Track) -> Result<String>;
}

/// Supplies related tracks for autoplay
#[async_trait]
pub trait RelatedTracks: Send + Sync {
    /// Return up to `limit` tracks related to `seed`
    async fn related(&self, seed: &Track, limit: usize) -> Result<Vec<Track>>;
}

/// Receives "now playing" status text for a session's voice channel
///
/// `None` clears the status.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, session_id: &str, status: Option<&str>);
}
