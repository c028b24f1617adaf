//! Effect presets
//!
//! An effect preset is a bundle of filter deltas applied with an intensity in
//! [0, 1]. Numeric fields move linearly from their neutral value toward the
//! preset target; toggles pass through unchanged.

use crate::error::{FilterError, Result};
use serde::{Deserialize, Serialize};
use streamify_core::{FilterConfig, Modulation, Rotation, Shelf};

/// Named effect preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectPreset {
    BassBoost,
    Nightcore,
    Vaporwave,
    EightD,
    Karaoke,
    TrebleBoost,
    Deep,
    Lofi,
    Radio,
    Telephone,
    Soft,
    Loud,
    Chipmunk,
    Darth,
    Echo,
    Vibrato,
    Tremolo,
    Reverb,
    Surround,
    Boost,
    SubBoost,
}

impl EffectPreset {
    pub const ALL: [EffectPreset; 21] = [
        EffectPreset::BassBoost,
        EffectPreset::Nightcore,
        EffectPreset::Vaporwave,
        EffectPreset::EightD,
        EffectPreset::Karaoke,
        EffectPreset::TrebleBoost,
        EffectPreset::Deep,
        EffectPreset::Lofi,
        EffectPreset::Radio,
        EffectPreset::Telephone,
        EffectPreset::Soft,
        EffectPreset::Loud,
        EffectPreset::Chipmunk,
        EffectPreset::Darth,
        EffectPreset::Echo,
        EffectPreset::Vibrato,
        EffectPreset::Tremolo,
        EffectPreset::Reverb,
        EffectPreset::Surround,
        EffectPreset::Boost,
        EffectPreset::SubBoost,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectPreset::BassBoost => "bassboost",
            EffectPreset::Nightcore => "nightcore",
            EffectPreset::Vaporwave => "vaporwave",
            EffectPreset::EightD => "8d",
            EffectPreset::Karaoke => "karaoke",
            EffectPreset::TrebleBoost => "trebleboost",
            EffectPreset::Deep => "deep",
            EffectPreset::Lofi => "lofi",
            EffectPreset::Radio => "radio",
            EffectPreset::Telephone => "telephone",
            EffectPreset::Soft => "soft",
            EffectPreset::Loud => "loud",
            EffectPreset::Chipmunk => "chipmunk",
            EffectPreset::Darth => "darth",
            EffectPreset::Echo => "echo",
            EffectPreset::Vibrato => "vibrato",
            EffectPreset::Tremolo => "tremolo",
            EffectPreset::Reverb => "reverb",
            EffectPreset::Surround => "surround",
            EffectPreset::Boost => "boost",
            EffectPreset::SubBoost => "subboost",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EffectPreset::BassBoost => "Heavy low-end boost",
            EffectPreset::Nightcore => "Faster and higher pitched",
            EffectPreset::Vaporwave => "Slower and lower pitched",
            EffectPreset::EightD => "Audio rotating around the listener",
            EffectPreset::Karaoke => "Removes center-panned vocals",
            EffectPreset::TrebleBoost => "Brighter highs",
            EffectPreset::Deep => "Lower pitch with extra bass",
            EffectPreset::Lofi => "Muffled, band-limited sound",
            EffectPreset::Radio => "AM radio band-pass",
            EffectPreset::Telephone => "Narrow mono telephone line",
            EffectPreset::Soft => "Quieter with rolled-off highs",
            EffectPreset::Loud => "Louder and compressed",
            EffectPreset::Chipmunk => "Very high pitch",
            EffectPreset::Darth => "Very low pitch",
            EffectPreset::Echo => "Long single echo",
            EffectPreset::Vibrato => "Pitch wobble",
            EffectPreset::Tremolo => "Volume wobble",
            EffectPreset::Reverb => "Short room reflections",
            EffectPreset::Surround => "Upmixed surround field",
            EffectPreset::Boost => "Louder with lifted bass and treble",
            EffectPreset::SubBoost => "Sub-bass shelf boost",
        }
    }

    /// Look up a preset by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    /// Filter values at full intensity
    pub fn target(&self) -> FilterConfig {
        let base = FilterConfig::default();
        match self {
            EffectPreset::BassBoost => FilterConfig {
                bass: Some(12.0),
                equalizer: Some(vec![
                    0.4, 0.35, 0.3, 0.2, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                ]),
                ..base
            },
            EffectPreset::Nightcore => FilterConfig {
                speed: Some(1.25),
                pitch: Some(1.25),
                ..base
            },
            EffectPreset::Vaporwave => FilterConfig {
                speed: Some(0.8),
                pitch: Some(0.8),
                ..base
            },
            EffectPreset::EightD => FilterConfig {
                rotation: Some(Rotation { speed: Some(0.125) }),
                ..base
            },
            EffectPreset::Karaoke => FilterConfig {
                karaoke: true,
                ..base
            },
            EffectPreset::TrebleBoost => FilterConfig {
                treble: Some(10.0),
                equalizer: Some(vec![
                    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.35, 0.4, 0.4, 0.35,
                ]),
                ..base
            },
            EffectPreset::Deep => FilterConfig {
                pitch: Some(0.85),
                bass: Some(6.0),
                ..base
            },
            EffectPreset::Lofi => FilterConfig {
                lowpass: Some(3500.0),
                highpass: Some(150.0),
                treble: Some(-4.0),
                ..base
            },
            EffectPreset::Radio => FilterConfig {
                highpass: Some(500.0),
                lowpass: Some(5000.0),
                compressor: true,
                ..base
            },
            EffectPreset::Telephone => FilterConfig {
                highpass: Some(300.0),
                lowpass: Some(3400.0),
                mono: true,
                ..base
            },
            EffectPreset::Soft => FilterConfig {
                volume: Some(70.0),
                treble: Some(-5.0),
                lowpass: Some(12000.0),
                ..base
            },
            EffectPreset::Loud => FilterConfig {
                volume: Some(150.0),
                compressor: true,
                ..base
            },
            EffectPreset::Chipmunk => FilterConfig {
                pitch: Some(1.6),
                ..base
            },
            EffectPreset::Darth => FilterConfig {
                pitch: Some(0.7),
                bass: Some(5.0),
                ..base
            },
            EffectPreset::Echo => FilterConfig { echo: true, ..base },
            EffectPreset::Vibrato => FilterConfig {
                vibrato: Some(Modulation {
                    frequency: Some(6.0),
                    depth: Some(0.6),
                }),
                ..base
            },
            EffectPreset::Tremolo => FilterConfig {
                tremolo: Some(Modulation {
                    frequency: Some(5.0),
                    depth: Some(0.7),
                }),
                ..base
            },
            EffectPreset::Reverb => FilterConfig {
                reverb: true,
                ..base
            },
            EffectPreset::Surround => FilterConfig {
                surround: true,
                ..base
            },
            EffectPreset::Boost => FilterConfig {
                volume: Some(130.0),
                bass: Some(4.0),
                treble: Some(4.0),
                ..base
            },
            EffectPreset::SubBoost => FilterConfig {
                bass: Some(6.0),
                lowshelf: Some(Shelf {
                    frequency: Some(60.0),
                    gain: Some(10.0),
                }),
                ..base
            },
        }
    }

    /// Filter values at `intensity`, clamped to [0, 1]
    pub fn apply(&self, intensity: f64) -> FilterConfig {
        let t = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        scale(&self.target(), t)
    }
}

/// Apply a named effect preset
///
/// Returns `None` for an unknown name.
pub fn apply_effect_preset(name: &str, intensity: f64) -> Option<FilterConfig> {
    EffectPreset::from_name(name).map(|preset| preset.apply(intensity))
}

/// An effect preset chosen by name, with its intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSelection {
    pub name: String,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

fn default_intensity() -> f64 {
    1.0
}

impl EffectSelection {
    pub fn new(name: impl Into<String>, intensity: f64) -> Self {
        Self {
            name: name.into(),
            intensity,
        }
    }

    /// Parse `name` or `name:intensity`
    pub fn parse(value: &str) -> Result<Self> {
        let (name, intensity) = match value.split_once(':') {
            Some((name, intensity)) => {
                let intensity = intensity
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| FilterError::InvalidIntensity(value.to_string()))?;
                (name, intensity)
            }
            None => (value, default_intensity()),
        };

        let preset = EffectPreset::from_name(name)
            .ok_or_else(|| FilterError::UnknownEffect(name.trim().to_string()))?;
        Ok(Self::new(preset.name(), intensity))
    }
}

/// Merge a list of effect selections left to right
///
/// Later presets win on conflicting numeric fields.
pub fn combine_effects(selections: &[EffectSelection]) -> Result<FilterConfig> {
    selections
        .iter()
        .try_fold(FilterConfig::default(), |acc, selection| {
            let applied = apply_effect_preset(&selection.name, selection.intensity)
                .ok_or_else(|| FilterError::UnknownEffect(selection.name.clone()))?;
            Ok(acc.merged(&applied))
        })
}

fn lerp(neutral: f64, target: f64, t: f64) -> f64 {
    let value = neutral + (target - neutral) * t;
    (value * 1000.0).round() / 1000.0
}

fn scale_opt(value: Option<f64>, neutral: f64, t: f64) -> Option<f64> {
    value.map(|target| lerp(neutral, target, t))
}

fn scale(target: &FilterConfig, t: f64) -> FilterConfig {
    FilterConfig {
        equalizer: target
            .equalizer
            .as_ref()
            .map(|bands| bands.iter().map(|gain| lerp(0.0, *gain, t)).collect()),
        preset: target.preset.clone(),
        bass: scale_opt(target.bass, 0.0, t),
        treble: scale_opt(target.treble, 0.0, t),
        speed: scale_opt(target.speed, 1.0, t),
        pitch: scale_opt(target.pitch, 1.0, t),
        volume: scale_opt(target.volume, 100.0, t),
        // Modulation rate passes through; only the depth fades in
        tremolo: target.tremolo.map(|m| Modulation {
            frequency: m.frequency,
            depth: scale_opt(m.depth, 0.0, t),
        }),
        vibrato: target.vibrato.map(|m| Modulation {
            frequency: m.frequency,
            depth: scale_opt(m.depth, 0.0, t),
        }),
        rotation: target.rotation,
        lowpass: scale_opt(target.lowpass, 20000.0, t),
        highpass: scale_opt(target.highpass, 20.0, t),
        bandpass: target.bandpass,
        bandreject: target.bandreject,
        lowshelf: target.lowshelf.map(|s| Shelf {
            frequency: s.frequency,
            gain: scale_opt(s.gain, 0.0, t),
        }),
        highshelf: target.highshelf.map(|s| Shelf {
            frequency: s.frequency,
            gain: scale_opt(s.gain, 0.0, t),
        }),
        peaking: target.peaking.map(|mut p| {
            p.gain = scale_opt(p.gain, 0.0, t);
            p
        }),
        ..target.clone()
    }
}
