//! Player and session events
//!
//! Every player owns a broadcast channel. Events are sent in the order the
//! player emits them, so a subscriber sees `TrackEnd` for one track before
//! `TrackStart` for the next.

use serde::Serialize;
use streamify_core::Track;

/// Why a track stopped playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackEndReason {
    /// The engine drained the stream
    Finished,
    /// `skip` or `previous`
    Skipped,
    /// `stop`
    Stopped,
}

/// Events emitted by a player
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// A stream for `track` has been handed to the engine
    TrackStart { track: Track },

    TrackEnd { track: Track, reason: TrackEndReason },

    /// Building or playing `track` failed
    TrackError {
        track: Option<Track>,
        message: String,
    },

    /// Nothing left to play
    QueueEnd,

    /// Autoplay is looking for tracks related to `seed`
    AutoplayStart { seed: Track },

    /// Autoplay found `tracks`; the first is about to play
    AutoplayAdd { tracks: Vec<Track> },

    /// Paused because the listener count dropped below the minimum
    AutoPause { members: usize },

    /// Resumed after an auto-pause
    AutoResume { members: usize },

    UserJoin { member: String, members: usize },

    UserLeave { member: String, members: usize },

    ChannelEmpty,

    ChannelMove { channel: String },

    /// Emitted exactly once, when the player is torn down
    Destroy,
}

impl PlayerEvent {
    /// Short name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::TrackStart { .. } => "trackStart",
            PlayerEvent::TrackEnd { .. } => "trackEnd",
            PlayerEvent::TrackError { .. } => "trackError",
            PlayerEvent::QueueEnd => "queueEnd",
            PlayerEvent::AutoplayStart { .. } => "autoplayStart",
            PlayerEvent::AutoplayAdd { .. } => "autoplayAdd",
            PlayerEvent::AutoPause { .. } => "autoPause",
            PlayerEvent::AutoResume { .. } => "autoResume",
            PlayerEvent::UserJoin { .. } => "userJoin",
            PlayerEvent::UserLeave { .. } => "userLeave",
            PlayerEvent::ChannelEmpty => "channelEmpty",
            PlayerEvent::ChannelMove { .. } => "channelMove",
            PlayerEvent::Destroy => "destroy",
        }
    }
}

/// Events emitted by the session manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ManagerEvent {
    PlayerCreated { session_id: String },
    PlayerDestroyed { session_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamify_core::TrackSource;

    #[test]
    fn events_serialise_with_type_tag() {
        let event = PlayerEvent::TrackEnd {
            track: Track::new("a", "Song", TrackSource::Youtube),
            reason: TrackEndReason::Skipped,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "trackEnd");
        assert_eq!(json["reason"], "skipped");
        assert_eq!(event.name(), "trackEnd");
    }

    #[test]
    fn manager_events_carry_session() {
        let json = serde_json::to_value(ManagerEvent::PlayerCreated {
            session_id: "guild-1".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "playerCreated");
        assert_eq!(json["session_id"], "guild-1");
    }
}
