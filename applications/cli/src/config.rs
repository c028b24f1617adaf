/// Streamify configuration
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use streamify_filters::OutputConfig;
use streamify_pipeline::{ExtractorSettings, PipelineConfig, ReadinessSettings, TranscoderSettings};
use streamify_playback::{PlayerConfig, VoiceStatusConfig};

/// File read when no `--config` is given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "streamify.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamifyConfig {
    #[serde(default)]
    pub extractor: ExtractorSettings,

    #[serde(default = "default_transcoder")]
    pub transcoder: TranscoderSettings,

    #[serde(default)]
    pub audio: OutputConfig,

    #[serde(default)]
    pub readiness: ReadinessSettings,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub voice_status: VoiceStatusConfig,
}

impl StreamifyConfig {
    /// Load configuration from a TOML file and the environment
    ///
    /// `STREAMIFY_*` variables override the file, with `__` between nested
    /// keys: `STREAMIFY_PLAYER__DEFAULT_VOLUME=120`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("STREAMIFY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(settings.build()?.try_deserialize()?)
    }

    /// Parse configuration from TOML text, without the environment
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.player.validate().map_err(ConfigError::Invalid)?;

        if self.readiness.normal_timeout_ms == 0 || self.readiness.live_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "readiness timeouts must be greater than 0".to_string(),
            ));
        }

        if !is_bitrate(&self.audio.bitrate) {
            return Err(ConfigError::Invalid(format!(
                "audio.bitrate must look like 128k, got {:?}",
                self.audio.bitrate
            )));
        }

        if self.extractor.path.as_os_str().is_empty() || self.transcoder.path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "extractor.path and transcoder.path must not be empty".to_string(),
            ));
        }

        if self.voice_status.enabled && self.voice_status.template.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "voice_status.template must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The pipeline half of the configuration
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            extractor: self.extractor.clone(),
            transcoder: self.transcoder.clone(),
            audio: self.audio.clone(),
            readiness: self.readiness,
        }
    }
}

impl Default for StreamifyConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorSettings::default(),
            transcoder: default_transcoder(),
            audio: OutputConfig::default(),
            readiness: ReadinessSettings::default(),
            player: PlayerConfig::default(),
            voice_status: VoiceStatusConfig::default(),
        }
    }
}

fn is_bitrate(value: &str) -> bool {
    let digits = value.strip_suffix(['k', 'K']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

// Default values
fn default_transcoder() -> TranscoderSettings {
    PipelineConfig::default().transcoder
}
