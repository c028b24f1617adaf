//! Transcoder output selection

use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Opus in an Ogg container
    #[default]
    Opus,
    Mp3,
    /// AAC in an ADTS stream
    Aac,
}

impl OutputFormat {
    pub fn codec(&self) -> &'static str {
        match self {
            OutputFormat::Opus => "libopus",
            OutputFormat::Mp3 => "libmp3lame",
            OutputFormat::Aac => "aac",
        }
    }

    pub fn container(&self) -> &'static str {
        match self {
            OutputFormat::Opus => "ogg",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "adts",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Opus => "audio/ogg",
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Aac => "audio/aac",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Opus => "opus",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "aac",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opus" => Ok(OutputFormat::Opus),
            "mp3" => Ok(OutputFormat::Mp3),
            "aac" => Ok(OutputFormat::Aac),
            other => Err(FilterError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Codec and bitrate for transcoder output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_bitrate")]
    pub bitrate: String,
}

fn default_bitrate() -> String {
    "128k".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            bitrate: default_bitrate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_is_opus_128k() {
        let output = OutputConfig::default();
        assert_eq!(output.format, OutputFormat::Opus);
        assert_eq!(output.bitrate, "128k");
    }

    #[test]
    fn parse_format_names() {
        assert_eq!("MP3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!("aac".parse::<OutputFormat>().unwrap().container(), "adts");
        assert!("flac".parse::<OutputFormat>().is_err());
    }
}
