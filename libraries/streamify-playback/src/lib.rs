//! Streamify Playback - per-session player and session registry
//!
//! A [`Player`] drives one session: it keeps the queue, asks a
//! [`PipelineFactory`](streamify_pipeline::PipelineFactory) for a pipeline per
//! track and hands the resulting streams to a [`PlaybackEngine`]. The
//! [`SessionManager`] owns every player and reacts to voice presence.
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamify_core::{Track, TrackSource};
//! use streamify_pipeline::{PipelineConfig, ProcessPipelineFactory};
//! use streamify_playback::{PlayOptions, PlaybackEngine, PlayerConfig, SessionManager};
//!
//! # async fn run(engine: Arc<dyn PlaybackEngine>) {
//! let factory = Arc::new(ProcessPipelineFactory::new(PipelineConfig::default()));
//! let manager = SessionManager::new(factory, PlayerConfig::default());
//!
//! let player = manager.create("guild-1", engine);
//! let track = Track::new("dQw4w9WgXcQ", "Song", TrackSource::Youtube);
//! player.play(track, PlayOptions::default()).await;
//! # }
//! ```

#![forbid(unsafe_code)]

mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
mod guard;
pub mod player;
pub mod queue;
pub mod session;
pub mod status;
pub mod types;

pub use config::{
    AutoLeaveConfig, AutoPauseConfig, AutoplayConfig, PlayerConfig, MAX_VOLUME, MIN_VOLUME,
};
pub use engine::{EngineSignal, PlaybackEngine};
pub use error::{PlayerError, Result};
pub use events::{ManagerEvent, PlayerEvent, TrackEndReason};
pub use player::{
    PlayOptions, Player, PlayerServices, PlayerSnapshot, MAX_CONSECUTIVE_FAILURES,
};
pub use queue::{PlaybackQueue, QueueSnapshot, DEFAULT_MAX_HISTORY};
pub use session::{PresenceUpdate, SessionManager, SessionStats};
pub use status::{render_status, VoiceStatus, VoiceStatusConfig};
pub use types::{PlayerState, RepeatMode};
