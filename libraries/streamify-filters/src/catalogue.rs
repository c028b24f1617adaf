//! Filter catalogue
//!
//! Describes every filter the chain builder understands, for help output and
//! API discovery.

use crate::eq::{EqPreset, MAX_BAND_GAIN, MIN_BAND_GAIN};
use crate::stages::{
    Range, BASS_RANGE, HIGHPASS_RANGE, LOWPASS_RANGE, PITCH_RANGE, ROTATION_RANGE, SPEED_RANGE,
    TREBLE_RANGE, TREMOLO_FREQUENCY_RANGE, VIBRATO_FREQUENCY_RANGE, VOLUME_RANGE,
};
use serde::Serialize;

/// Value shape of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Number,
    Boolean,
    Array,
    Object,
    String,
}

/// One catalogue entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterInfo {
    pub name: &'static str,
    pub kind: FilterKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<&'static str>,
}

impl FilterInfo {
    fn new(name: &'static str, kind: FilterKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            min: None,
            max: None,
            description,
            values: Vec::new(),
        }
    }

    fn ranged(name: &'static str, range: Range, description: &'static str) -> Self {
        Self {
            min: Some(range.min),
            max: Some(range.max),
            ..Self::new(name, FilterKind::Number, description)
        }
    }

    fn toggle(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FilterKind::Boolean, description)
    }
}

/// Every filter, in stage order
pub fn available_filters() -> Vec<FilterInfo> {
    vec![
        FilterInfo {
            min: Some(MIN_BAND_GAIN),
            max: Some(MAX_BAND_GAIN),
            ..FilterInfo::new("equalizer", FilterKind::Array, "15-band equalizer (bands 0-14)")
        },
        FilterInfo {
            values: EqPreset::ALL.iter().map(|p| p.name()).collect(),
            ..FilterInfo::new("preset", FilterKind::String, "EQ preset name")
        },
        FilterInfo::ranged("bass", BASS_RANGE, "Bass boost/cut in dB"),
        FilterInfo::ranged("treble", TREBLE_RANGE, "Treble boost/cut in dB"),
        FilterInfo::ranged("speed", SPEED_RANGE, "Playback speed multiplier"),
        FilterInfo::ranged("pitch", PITCH_RANGE, "Pitch shift multiplier"),
        FilterInfo::ranged("volume", VOLUME_RANGE, "Volume percentage"),
        FilterInfo {
            min: Some(TREMOLO_FREQUENCY_RANGE.min),
            max: Some(TREMOLO_FREQUENCY_RANGE.max),
            ..FilterInfo::new("tremolo", FilterKind::Object, "Volume wobble {frequency, depth}")
        },
        FilterInfo {
            min: Some(VIBRATO_FREQUENCY_RANGE.min),
            max: Some(VIBRATO_FREQUENCY_RANGE.max),
            ..FilterInfo::new("vibrato", FilterKind::Object, "Pitch wobble {frequency, depth}")
        },
        FilterInfo {
            min: Some(ROTATION_RANGE.min),
            max: Some(ROTATION_RANGE.max),
            ..FilterInfo::new("rotation", FilterKind::Object, "8D rotation {speed}")
        },
        FilterInfo::ranged("lowpass", LOWPASS_RANGE, "Low-pass cutoff in Hz"),
        FilterInfo::ranged("highpass", HIGHPASS_RANGE, "High-pass cutoff in Hz"),
        FilterInfo::new("bandpass", FilterKind::Object, "Band-pass {frequency, width}"),
        FilterInfo::new("bandreject", FilterKind::Object, "Notch {frequency, width}"),
        FilterInfo::new("lowshelf", FilterKind::Object, "Low shelf {frequency, gain}"),
        FilterInfo::new("highshelf", FilterKind::Object, "High shelf {frequency, gain}"),
        FilterInfo::new("peaking", FilterKind::Object, "Peaking EQ {frequency, gain, q}"),
        FilterInfo::toggle("karaoke", "Remove center vocals"),
        FilterInfo::toggle("mono", "Downmix to mono"),
        FilterInfo::toggle("surround", "Surround upmix"),
        FilterInfo::toggle("flanger", "Flanger"),
        FilterInfo::toggle("phaser", "Phaser"),
        FilterInfo::toggle("chorus", "Chorus"),
        FilterInfo::toggle("compressor", "Dynamic range compressor"),
        FilterInfo::toggle("normalizer", "Loudness normalization"),
        FilterInfo::toggle("nightcore", "Nightcore preset"),
        FilterInfo::toggle("vaporwave", "Vaporwave preset"),
        FilterInfo::toggle("bassboost", "Bass boost preset"),
        FilterInfo::toggle("8d", "8D audio preset"),
        FilterInfo::toggle("echo", "Echo"),
        FilterInfo::toggle("reverb", "Reverb"),
    ]
}
