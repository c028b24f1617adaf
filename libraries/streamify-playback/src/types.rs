//! Core types for the player state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Nothing playing
    Idle,

    /// Building a pipeline for the current track
    Loading,

    /// A stream is exposed to the engine
    Playing,

    /// Position frozen, pipeline possibly torn down
    Paused,

    /// Terminal
    Destroyed,
}

impl PlayerState {
    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// ```text
    /// Idle      -> Loading | Destroyed
    /// Loading   -> Loading | Playing | Idle | Destroyed
    /// Playing   -> Paused | Loading | Idle | Destroyed
    /// Paused    -> Playing | Loading | Idle | Destroyed
    /// Destroyed -> (nothing)
    /// ```
    pub fn can_transition_to(self, next: PlayerState) -> bool {
        use PlayerState::{Destroyed, Idle, Loading, Paused, Playing};

        matches!(
            (self, next),
            (Idle, Loading | Destroyed)
                | (Loading, Loading | Playing | Idle | Destroyed)
                | (Playing, Paused | Loading | Idle | Destroyed)
                | (Paused, Playing | Loading | Idle | Destroyed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Loading => "loading",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the queue ends
    #[default]
    Off,

    /// Replay the current track
    Track,

    /// Loop the whole queue through history
    Queue,
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(RepeatMode::Off),
            "track" => Ok(RepeatMode::Track),
            "queue" => Ok(RepeatMode::Queue),
            other => Err(format!("Unknown repeat mode: {other}")),
        }
    }
}
