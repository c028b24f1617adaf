//! Audio filter configuration
//!
//! `FilterConfig` is a value: every mutation produces a new config. Consumers
//! never patch one in place, so a pipeline built from a config keeps seeing
//! exactly the parameters it was built with.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Low-frequency modulation parameters (tremolo, vibrato)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modulation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
}

/// Rotating stereo panner ("8D audio")
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Band-pass / band-reject parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BandFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

/// Shelving filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shelf {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
}

/// Parametric peaking filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Peaking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<f64>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Named audio-effect parameters
///
/// Unset fields emit no transcoder stage. Numeric values are stored as given;
/// clamping happens when the filter chain is built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 15-band equalizer gains, each in [-0.25, 1.0]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<f64>>,
    /// Named equalizer preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treble: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    /// Percent, 100 is unity gain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tremolo: Option<Modulation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrato: Option<Modulation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowpass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highpass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandpass: Option<BandFilter>,
    #[serde(alias = "notch", skip_serializing_if = "Option::is_none")]
    pub bandreject: Option<BandFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowshelf: Option<Shelf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highshelf: Option<Shelf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peaking: Option<Peaking>,

    #[serde(skip_serializing_if = "is_false")]
    pub karaoke: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub mono: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub surround: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub flanger: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub phaser: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub chorus: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub compressor: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub normalizer: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub nightcore: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub vaporwave: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub bassboost: bool,
    #[serde(rename = "8d", skip_serializing_if = "is_false")]
    pub eight_d: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub echo: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub reverb: bool,
}

impl FilterConfig {
    /// Every filter name accepted by [`FilterConfig::with_filter`]
    pub const NAMES: &'static [&'static str] = &[
        "equalizer",
        "preset",
        "bass",
        "treble",
        "speed",
        "pitch",
        "volume",
        "tremolo",
        "vibrato",
        "rotation",
        "lowpass",
        "highpass",
        "bandpass",
        "bandreject",
        "lowshelf",
        "highshelf",
        "peaking",
        "karaoke",
        "mono",
        "surround",
        "flanger",
        "phaser",
        "chorus",
        "compressor",
        "normalizer",
        "nightcore",
        "vaporwave",
        "bassboost",
        "8d",
        "echo",
        "reverb",
    ];

    /// True when no filter is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the filters that are currently set, in catalogue order
    pub fn active_names(&self) -> Vec<&'static str> {
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        Self::NAMES
            .iter()
            .copied()
            .filter(|name| map.contains_key(*name))
            .collect()
    }

    /// Return a new config with one filter set
    ///
    /// Loosely typed input is coerced: numeric strings become numbers,
    /// `"true"`/`"false"` become booleans, and `null` or unparseable numbers
    /// unset the filter.
    pub fn with_filter(&self, name: &str, value: Value) -> Result<Self> {
        let key = canonical_name(name)?;
        let mut map = self.to_map()?;
        let requested = match &value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        };

        let value = match value {
            // The preset is the only textual filter
            Value::String(s) if key == "preset" => {
                let s = s.trim();
                if s.is_empty() {
                    Value::Null
                } else {
                    Value::String(s.to_string())
                }
            }
            other => coerce(other),
        };

        if requested && value.is_null() {
            debug!(filter = key, "Unparseable filter value, unsetting");
        }

        match value {
            Value::Null | Value::Bool(false) => {
                map.remove(key);
            }
            value => {
                map.insert(key.to_string(), value);
            }
        }

        serde_json::from_value(Value::Object(map))
            .map_err(|e| CoreError::invalid_filter_value(name, e.to_string()))
    }

    /// Return a new config with one filter unset
    pub fn without_filter(&self, name: &str) -> Result<Self> {
        self.with_filter(name, Value::Null)
    }

    /// Build a config from a loosely typed JSON object
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(CoreError::invalid_filter_value(
                "filters",
                "expected an object",
            ));
        };

        entries
            .into_iter()
            .try_fold(Self::default(), |config, (name, value)| {
                config.with_filter(&name, value)
            })
    }

    /// Layer `overlay` on top of this config
    ///
    /// Fields set in `overlay` win; boolean toggles are OR-ed.
    pub fn merged(&self, overlay: &FilterConfig) -> FilterConfig {
        FilterConfig {
            equalizer: overlay.equalizer.clone().or_else(|| self.equalizer.clone()),
            preset: overlay.preset.clone().or_else(|| self.preset.clone()),
            bass: overlay.bass.or(self.bass),
            treble: overlay.treble.or(self.treble),
            speed: overlay.speed.or(self.speed),
            pitch: overlay.pitch.or(self.pitch),
            volume: overlay.volume.or(self.volume),
            tremolo: overlay.tremolo.or(self.tremolo),
            vibrato: overlay.vibrato.or(self.vibrato),
            rotation: overlay.rotation.or(self.rotation),
            lowpass: overlay.lowpass.or(self.lowpass),
            highpass: overlay.highpass.or(self.highpass),
            bandpass: overlay.bandpass.or(self.bandpass),
            bandreject: overlay.bandreject.or(self.bandreject),
            lowshelf: overlay.lowshelf.or(self.lowshelf),
            highshelf: overlay.highshelf.or(self.highshelf),
            peaking: overlay.peaking.or(self.peaking),
            karaoke: self.karaoke || overlay.karaoke,
            mono: self.mono || overlay.mono,
            surround: self.surround || overlay.surround,
            flanger: self.flanger || overlay.flanger,
            phaser: self.phaser || overlay.phaser,
            chorus: self.chorus || overlay.chorus,
            compressor: self.compressor || overlay.compressor,
            normalizer: self.normalizer || overlay.normalizer,
            nightcore: self.nightcore || overlay.nightcore,
            vaporwave: self.vaporwave || overlay.vaporwave,
            bassboost: self.bassboost || overlay.bassboost,
            eight_d: self.eight_d || overlay.eight_d,
            echo: self.echo || overlay.echo,
            reverb: self.reverb || overlay.reverb,
        }
    }

    fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

fn canonical_name(name: &str) -> Result<&'static str> {
    let name = if name == "notch" { "bandreject" } else { name };
    FilterConfig::NAMES
        .iter()
        .copied()
        .find(|known| *known == name)
        .ok_or_else(|| CoreError::UnknownFilter(name.to_string()))
}

fn coerce(value: Value) -> Value {
    match value {
        Value::String(s) => coerce_str(&s),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => Value::Number(n),
            _ => Value::Null,
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match coerce(item) {
                    Value::Null => Value::from(0.0),
                    other => other,
                })
                .collect(),
        ),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, coerce(v)))
                .filter(|(_, v)| !v.is_null())
                .collect(),
        ),
        other => other,
    }
}

fn coerce_str(s: &str) -> Value {
    match s.trim() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        trimmed => trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
    }
}
