/// Pipeline configuration
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use streamify_core::Track;
use streamify_filters::OutputConfig;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_extractor")]
    pub extractor: ExtractorSettings,

    #[serde(default = "default_transcoder")]
    pub transcoder: TranscoderSettings,

    #[serde(default)]
    pub audio: OutputConfig,

    #[serde(default = "default_readiness")]
    pub readiness: ReadinessSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractorSettings {
    #[serde(default = "default_extractor_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub cookies_path: Option<PathBuf>,

    /// Format selector override for non-live tracks
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    #[serde(default = "default_sponsorblock")]
    pub sponsorblock: SponsorBlockSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SponsorBlockSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_sponsorblock_categories")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TranscoderSettings {
    #[serde(default = "default_transcoder_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_normal_timeout_ms")]
    pub normal_timeout_ms: u64,

    #[serde(default = "default_live_timeout_ms")]
    pub live_timeout_ms: u64,
}

impl PipelineConfig {
    /// How long `create` waits for the first transcoder output
    ///
    /// Live and indeterminate tracks get the longer budget.
    pub fn readiness_timeout(&self, track: &Track) -> Duration {
        if track.is_indeterminate() {
            Duration::from_millis(self.readiness.live_timeout_ms)
        } else {
            Duration::from_millis(self.readiness.normal_timeout_ms)
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extractor: default_extractor(),
            transcoder: default_transcoder(),
            audio: OutputConfig::default(),
            readiness: default_readiness(),
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        default_extractor()
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        default_readiness()
    }
}

// Default values
fn default_extractor() -> ExtractorSettings {
    ExtractorSettings {
        path: default_extractor_path(),
        cookies_path: None,
        format: None,
        retries: default_retries(),
        fragment_retries: default_retries(),
        sponsorblock: default_sponsorblock(),
    }
}

fn default_extractor_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_retries() -> u32 {
    3
}

fn default_sponsorblock() -> SponsorBlockSettings {
    SponsorBlockSettings {
        enabled: default_enabled(),
        categories: default_sponsorblock_categories(),
    }
}

fn default_enabled() -> bool {
    true
}

fn default_sponsorblock_categories() -> Vec<String> {
    vec!["sponsor".to_string(), "selfpromo".to_string()]
}

fn default_transcoder() -> TranscoderSettings {
    TranscoderSettings {
        path: default_transcoder_path(),
    }
}

fn default_transcoder_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_readiness() -> ReadinessSettings {
    ReadinessSettings {
        normal_timeout_ms: default_normal_timeout_ms(),
        live_timeout_ms: default_live_timeout_ms(),
    }
}

fn default_normal_timeout_ms() -> u64 {
    15_000
}

fn default_live_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamify_core::TrackSource;

    #[test]
    fn live_tracks_get_thirty_seconds() {
        let config = PipelineConfig::default();
        let live = Track::new("live", "Radio", TrackSource::Twitch).live();
        let normal =
            Track::new("vid", "Song", TrackSource::Youtube).with_duration(Duration::from_secs(200));
        let unknown = Track::new("vid", "Song", TrackSource::Youtube);

        assert_eq!(config.readiness_timeout(&live), Duration::from_secs(30));
        assert_eq!(config.readiness_timeout(&unknown), Duration::from_secs(30));
        assert_eq!(config.readiness_timeout(&normal), Duration::from_secs(15));
    }

    #[test]
    fn defaults_match_tooling() {
        let config = PipelineConfig::default();
        assert_eq!(config.extractor.path, PathBuf::from("yt-dlp"));
        assert_eq!(config.transcoder.path, PathBuf::from("ffmpeg"));
        assert!(config.extractor.sponsorblock.enabled);
        assert_eq!(config.audio.bitrate, "128k");
    }
}
