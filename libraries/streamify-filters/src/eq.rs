//! 15-band equalizer
//!
//! Provides:
//! - Fixed center frequencies (25 Hz to 16 kHz)
//! - Per-band gain in [-0.25, 1.0], scaled by 12 for the transcoder
//! - Named presets built on the same stage builder

use crate::stages::num;
use serde::Serialize;

/// Center frequencies of the 15 bands (Hz)
pub const EQ_BANDS: [u32; 15] = [
    25, 40, 63, 100, 160, 250, 400, 630, 1000, 1600, 2500, 4000, 6300, 10000, 16000,
];

/// Lowest accepted band gain
pub const MIN_BAND_GAIN: f64 = -0.25;
/// Highest accepted band gain
pub const MAX_BAND_GAIN: f64 = 1.0;
/// Multiplier from band gain to transcoder dB
pub const GAIN_SCALE: f64 = 12.0;

/// Build one peaking stage per non-zero band
///
/// Bands past the 15th are ignored.
pub fn equalizer_stages(gains: &[f64]) -> Vec<String> {
    gains
        .iter()
        .zip(EQ_BANDS)
        .filter(|(gain, _)| gain.is_finite() && **gain != 0.0)
        .map(|(gain, freq)| {
            let freq = f64::from(freq);
            let width = if freq < 1000.0 { freq * 0.5 } else { freq * 0.3 };
            let gain = gain.clamp(MIN_BAND_GAIN, MAX_BAND_GAIN) * GAIN_SCALE;
            format!(
                "equalizer=f={}:width_type=h:width={}:g={}",
                num(freq),
                num(width),
                num(gain)
            )
        })
        .collect()
}

/// Named equalizer preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EqPreset {
    /// All bands at 0
    #[default]
    Flat,
    Rock,
    Pop,
    Jazz,
    Classical,
    Electronic,
    Hiphop,
    Acoustic,
    Rnb,
    Latin,
    Loudness,
    Piano,
    /// Scooped lows and highs, lifted mids
    Vocal,
    BassHeavy,
    TrebleHeavy,
    /// Sub-bass lift, stronger than `BassHeavy`
    ExtraBass,
    /// Presence and air lift
    CrystalClear,
}

impl EqPreset {
    pub const ALL: [EqPreset; 17] = [
        EqPreset::Flat,
        EqPreset::Rock,
        EqPreset::Pop,
        EqPreset::Jazz,
        EqPreset::Classical,
        EqPreset::Electronic,
        EqPreset::Hiphop,
        EqPreset::Acoustic,
        EqPreset::Rnb,
        EqPreset::Latin,
        EqPreset::Loudness,
        EqPreset::Piano,
        EqPreset::Vocal,
        EqPreset::BassHeavy,
        EqPreset::TrebleHeavy,
        EqPreset::ExtraBass,
        EqPreset::CrystalClear,
    ];

    /// Band gains for this preset
    pub fn gains(&self) -> [f64; 15] {
        match self {
            EqPreset::Flat => [0.0; 15],
            EqPreset::Rock => [
                0.3, 0.25, 0.2, 0.1, -0.05, -0.1, 0.1, 0.25, 0.35, 0.4, 0.4, 0.35, 0.3, 0.25, 0.2,
            ],
            EqPreset::Pop => [
                0.2, 0.35, 0.4, 0.35, 0.2, 0.0, -0.1, -0.1, 0.0, 0.15, 0.2, 0.25, 0.3, 0.35, 0.35,
            ],
            EqPreset::Jazz => [
                0.2, 0.15, 0.1, 0.0, -0.1, -0.1, 0.0, 0.1, 0.2, 0.25, 0.25, 0.2, 0.15, 0.1, 0.1,
            ],
            EqPreset::Classical => [
                0.3, 0.25, 0.2, 0.15, 0.1, 0.0, -0.1, -0.1, 0.0, 0.1, 0.2, 0.25, 0.3, 0.35, 0.35,
            ],
            EqPreset::Electronic => [
                0.4, 0.35, 0.25, 0.0, -0.1, -0.15, 0.0, 0.1, 0.2, 0.3, 0.35, 0.4, 0.35, 0.3, 0.25,
            ],
            EqPreset::Hiphop => [
                0.4, 0.35, 0.3, 0.2, 0.1, 0.0, -0.1, -0.1, 0.0, 0.15, 0.2, 0.15, 0.1, 0.1, 0.15,
            ],
            EqPreset::Acoustic => [
                0.3, 0.25, 0.2, 0.15, 0.1, 0.1, 0.15, 0.2, 0.2, 0.15, 0.1, 0.1, 0.15, 0.2, 0.25,
            ],
            EqPreset::Rnb => [
                0.35, 0.4, 0.35, 0.2, 0.05, -0.05, 0.0, 0.1, 0.15, 0.15, 0.1, 0.05, 0.1, 0.15, 0.2,
            ],
            EqPreset::Latin => [
                0.25, 0.2, 0.1, 0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.35, 0.35, 0.3, 0.25, 0.2,
            ],
            EqPreset::Loudness => [
                0.4, 0.35, 0.25, 0.1, 0.0, -0.1, -0.1, 0.0, 0.1, 0.2, 0.3, 0.35, 0.4, 0.45, 0.45,
            ],
            EqPreset::Piano => [
                0.2, 0.15, 0.1, 0.05, 0.0, 0.05, 0.1, 0.15, 0.2, 0.2, 0.15, 0.1, 0.1, 0.15, 0.2,
            ],
            EqPreset::Vocal => [
                -0.2, -0.15, -0.1, 0.0, 0.2, 0.35, 0.4, 0.4, 0.35, 0.2, 0.0, -0.1, -0.15, -0.15,
                -0.1,
            ],
            EqPreset::BassHeavy => [
                0.5, 0.45, 0.4, 0.3, 0.2, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ],
            EqPreset::TrebleHeavy => [
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.4, 0.45, 0.5, 0.5,
            ],
            EqPreset::ExtraBass => [
                0.7, 0.65, 0.55, 0.4, 0.25, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ],
            EqPreset::CrystalClear => [
                -0.05, -0.05, 0.0, 0.0, 0.0, 0.0, 0.05, 0.1, 0.15, 0.25, 0.35, 0.4, 0.45, 0.45,
                0.4,
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EqPreset::Flat => "flat",
            EqPreset::Rock => "rock",
            EqPreset::Pop => "pop",
            EqPreset::Jazz => "jazz",
            EqPreset::Classical => "classical",
            EqPreset::Electronic => "electronic",
            EqPreset::Hiphop => "hiphop",
            EqPreset::Acoustic => "acoustic",
            EqPreset::Rnb => "rnb",
            EqPreset::Latin => "latin",
            EqPreset::Loudness => "loudness",
            EqPreset::Piano => "piano",
            EqPreset::Vocal => "vocal",
            EqPreset::BassHeavy => "bass_heavy",
            EqPreset::TrebleHeavy => "treble_heavy",
            EqPreset::ExtraBass => "extra_bass",
            EqPreset::CrystalClear => "crystal_clear",
        }
    }

    /// Look up a preset by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    /// Transcoder stages for this preset
    pub fn stages(&self) -> Vec<String> {
        equalizer_stages(&self.gains())
    }
}
