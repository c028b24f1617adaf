//! Playback engine seam
//!
//! The engine is whatever consumes the encoded stream: a voice transport, an
//! HTTP response, a file. The player hands it streams and tells it to pause
//! or stop; the engine reports back when a stream drains or fails.

use streamify_pipeline::{AudioStream, StreamId};

/// Consumer of exposed streams
///
/// Calls are made with the player's state lock held. Implementations must
/// return promptly and must not call back into the player from inside a
/// call; report back through [`EngineSignal`] instead.
pub trait PlaybackEngine: Send + Sync {
    /// Start consuming `stream`, replacing whatever was playing
    fn play(&self, stream: AudioStream);

    fn pause(&self);

    fn unpause(&self);

    /// Stop consuming the current stream
    ///
    /// Stopping must not be reported as [`EngineSignal::Idle`] for a stream
    /// the player still considers current; the player ignores such signals
    /// while it is switching streams anyway.
    fn stop(&self);
}

/// Engine-side notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// The stream reached its end
    Idle(StreamId),
    /// The stream failed
    Error(StreamId, String),
}

impl EngineSignal {
    pub fn stream_id(&self) -> StreamId {
        match self {
            EngineSignal::Idle(id) | EngineSignal::Error(id, _) => *id,
        }
    }
}
