/// Player configuration
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Volume bounds, in percent
pub const MIN_VOLUME: u16 = 0;
pub const MAX_VOLUME: u16 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: u16,

    #[serde(default = "default_max_previous_tracks")]
    pub max_previous_tracks: usize,

    #[serde(default)]
    pub auto_leave: AutoLeaveConfig,

    #[serde(default)]
    pub auto_pause: AutoPauseConfig,

    #[serde(default)]
    pub autoplay: AutoplayConfig,
}

/// Leave the session when it is empty or idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutoLeaveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long an empty channel is tolerated
    #[serde(default = "default_empty_delay_ms")]
    pub empty_delay_ms: u64,

    /// How long the player may sit without playing; zero disables
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
}

/// Pause while too few listeners are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutoPauseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_min_users")]
    pub min_users: usize,
}

/// Keep playing related tracks once the queue runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutoplayConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_tracks")]
    pub max_tracks: usize,
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_volume > MAX_VOLUME {
            return Err(format!(
                "player.default_volume must be at most {MAX_VOLUME}, got {}",
                self.default_volume
            ));
        }
        if self.max_previous_tracks == 0 {
            return Err("player.max_previous_tracks must be greater than 0".to_string());
        }
        if self.auto_leave.enabled && self.auto_leave.empty_delay_ms == 0 {
            return Err("player.auto_leave.empty_delay_ms must be greater than 0".to_string());
        }
        if self.autoplay.enabled && self.autoplay.max_tracks == 0 {
            return Err("player.autoplay.max_tracks must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl AutoLeaveConfig {
    pub fn empty_delay(&self) -> Duration {
        Duration::from_millis(self.empty_delay_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            max_previous_tracks: default_max_previous_tracks(),
            auto_leave: AutoLeaveConfig::default(),
            auto_pause: AutoPauseConfig::default(),
            autoplay: AutoplayConfig::default(),
        }
    }
}

impl Default for AutoLeaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            empty_delay_ms: default_empty_delay_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
        }
    }
}

impl Default for AutoPauseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_users: default_min_users(),
        }
    }
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tracks: default_max_tracks(),
        }
    }
}

// Default values
fn default_volume() -> u16 {
    80
}

fn default_max_previous_tracks() -> usize {
    crate::queue::DEFAULT_MAX_HISTORY
}

fn default_true() -> bool {
    true
}

fn default_empty_delay_ms() -> u64 {
    30_000
}

fn default_inactivity_timeout_ms() -> u64 {
    300_000
}

fn default_min_users() -> usize {
    1
}

fn default_max_tracks() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.default_volume, 80);
        assert_eq!(config.max_previous_tracks, 25);
        assert_eq!(config.auto_leave.empty_delay(), Duration::from_secs(30));
        assert_eq!(config.auto_leave.inactivity_timeout(), Duration::from_secs(300));
        assert_eq!(config.auto_pause.min_users, 1);
        assert!(!config.autoplay.enabled);
        assert_eq!(config.autoplay.max_tracks, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{"auto_leave": {"enabled": false}, "autoplay": {"enabled": true}}"#)
                .unwrap();
        assert!(!config.auto_leave.enabled);
        assert_eq!(config.auto_leave.empty_delay_ms, 30_000);
        assert!(config.autoplay.enabled);
        assert_eq!(config.autoplay.max_tracks, 5);
    }

    #[test]
    fn validate_rejects_loud_default() {
        let config = PlayerConfig {
            default_volume: 250,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
