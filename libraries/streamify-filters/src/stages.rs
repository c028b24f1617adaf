//! Filter stage builder
//!
//! Turns a `FilterConfig` into the ordered list of transcoder filter stages.
//! The order is fixed:
//!
//! ```text
//! equalizer → EQ preset → bass → treble → speed → pitch → volume →
//! tremolo → vibrato → rotation → lowpass → highpass → bandpass →
//! bandreject → lowshelf → highshelf → peaking → toggles
//! ```

use crate::eq::{equalizer_stages, EqPreset};
use tracing::debug;
use streamify_core::FilterConfig;

/// Inclusive clamp range for a numeric filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

pub const BASS_RANGE: Range = Range::new(-20.0, 20.0);
pub const TREBLE_RANGE: Range = Range::new(-20.0, 20.0);
pub const SPEED_RANGE: Range = Range::new(0.5, 2.0);
pub const PITCH_RANGE: Range = Range::new(0.5, 2.0);
pub const VOLUME_RANGE: Range = Range::new(0.0, 200.0);
pub const TREMOLO_FREQUENCY_RANGE: Range = Range::new(0.1, 20.0);
pub const VIBRATO_FREQUENCY_RANGE: Range = Range::new(0.1, 14.0);
pub const DEPTH_RANGE: Range = Range::new(0.0, 1.0);
pub const ROTATION_RANGE: Range = Range::new(0.01, 5.0);
pub const LOWPASS_RANGE: Range = Range::new(100.0, 20000.0);
pub const HIGHPASS_RANGE: Range = Range::new(20.0, 10000.0);

/// Sample rate the pitch stage resamples around
pub const PITCH_SAMPLE_RATE: u32 = 48000;

const DEFAULT_MODULATION_FREQUENCY: f64 = 4.0;
const DEFAULT_MODULATION_DEPTH: f64 = 0.5;
const DEFAULT_ROTATION_SPEED: f64 = 0.125;

/// Format a number the way the transcoder expects it
///
/// Integral values print without a fraction (`2`, not `2.0`), and negative
/// zero prints as `0`.
pub(crate) fn num(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// A set, finite value
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// A set, finite, non-zero value, otherwise `default`
fn or_default(value: Option<f64>, default: f64) -> f64 {
    value
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(default)
}

fn pitch_stage(pitch: f64) -> String {
    format!(
        "asetrate={rate}*{},aresample={rate}",
        num(pitch),
        rate = PITCH_SAMPLE_RATE
    )
}

/// Build the ordered stage list for `filters`
pub fn build_stages(filters: &FilterConfig) -> Vec<String> {
    let mut stages = Vec::new();

    if let Some(bands) = &filters.equalizer {
        stages.extend(equalizer_stages(bands));
    }

    if let Some(name) = filters.preset.as_deref() {
        match EqPreset::from_name(name) {
            Some(preset) => stages.extend(preset.stages()),
            None => debug!(preset = %name, "Unknown equalizer preset, skipping"),
        }
    }

    if let Some(bass) = finite(filters.bass).filter(|v| *v != 0.0) {
        stages.push(format!("bass=g={}", num(BASS_RANGE.clamp(bass))));
    }

    if let Some(treble) = finite(filters.treble).filter(|v| *v != 0.0) {
        stages.push(format!("treble=g={}", num(TREBLE_RANGE.clamp(treble))));
    }

    if let Some(speed) = finite(filters.speed).filter(|v| *v != 1.0) {
        stages.push(format!("atempo={}", num(SPEED_RANGE.clamp(speed))));
    }

    if let Some(pitch) = finite(filters.pitch).filter(|v| *v != 1.0) {
        stages.push(pitch_stage(PITCH_RANGE.clamp(pitch)));
    }

    if let Some(volume) = finite(filters.volume).filter(|v| *v != 100.0) {
        stages.push(format!("volume={}", num(VOLUME_RANGE.clamp(volume) / 100.0)));
    }

    if let Some(tremolo) = filters.tremolo {
        let freq = or_default(tremolo.frequency, DEFAULT_MODULATION_FREQUENCY);
        let depth = finite(tremolo.depth).unwrap_or(DEFAULT_MODULATION_DEPTH);
        stages.push(format!(
            "tremolo=f={}:d={}",
            num(TREMOLO_FREQUENCY_RANGE.clamp(freq)),
            num(DEPTH_RANGE.clamp(depth))
        ));
    }

    if let Some(vibrato) = filters.vibrato {
        let freq = or_default(vibrato.frequency, DEFAULT_MODULATION_FREQUENCY);
        let depth = finite(vibrato.depth).unwrap_or(DEFAULT_MODULATION_DEPTH);
        stages.push(format!(
            "vibrato=f={}:d={}",
            num(VIBRATO_FREQUENCY_RANGE.clamp(freq)),
            num(DEPTH_RANGE.clamp(depth))
        ));
    }

    if let Some(rotation) = filters.rotation {
        let speed = or_default(rotation.speed, DEFAULT_ROTATION_SPEED);
        stages.push(format!(
            "apulsator=mode=sine:hz={}:width=1",
            num(ROTATION_RANGE.clamp(speed))
        ));
    }

    // Zero means "off" for the pass filters
    if let Some(freq) = finite(filters.lowpass).filter(|v| *v != 0.0) {
        stages.push(format!("lowpass=f={}", num(LOWPASS_RANGE.clamp(freq))));
    }

    if let Some(freq) = finite(filters.highpass).filter(|v| *v != 0.0) {
        stages.push(format!("highpass=f={}", num(HIGHPASS_RANGE.clamp(freq))));
    }

    if let Some(band) = filters.bandpass {
        stages.push(format!(
            "bandpass=f={}:width_type=h:width={}",
            num(or_default(band.frequency, 1000.0)),
            num(or_default(band.width, 200.0))
        ));
    }

    if let Some(band) = filters.bandreject {
        stages.push(format!(
            "bandreject=f={}:width_type=h:width={}",
            num(or_default(band.frequency, 1000.0)),
            num(or_default(band.width, 200.0))
        ));
    }

    if let Some(shelf) = filters.lowshelf {
        stages.push(format!(
            "lowshelf=f={}:g={}",
            num(or_default(shelf.frequency, 200.0)),
            num(finite(shelf.gain).unwrap_or(0.0))
        ));
    }

    if let Some(shelf) = filters.highshelf {
        stages.push(format!(
            "highshelf=f={}:g={}",
            num(or_default(shelf.frequency, 3000.0)),
            num(finite(shelf.gain).unwrap_or(0.0))
        ));
    }

    if let Some(peak) = filters.peaking {
        stages.push(format!(
            "equalizer=f={}:width_type=q:width={}:g={}",
            num(or_default(peak.frequency, 1000.0)),
            num(or_default(peak.q, 1.0)),
            num(finite(peak.gain).unwrap_or(0.0))
        ));
    }

    push_toggles(filters, &mut stages);

    stages
}

fn push_toggles(filters: &FilterConfig, stages: &mut Vec<String>) {
    let toggles: [(bool, &[&str]); 14] = [
        (filters.karaoke, &["pan=stereo|c0=c0-c1|c1=c1-c0"]),
        (filters.mono, &["pan=mono|c0=0.5*c0+0.5*c1"]),
        (filters.surround, &["surround"]),
        (filters.flanger, &["flanger"]),
        (filters.phaser, &["aphaser"]),
        (
            filters.chorus,
            &["chorus=0.5:0.9:50|60|40:0.4|0.32|0.3:0.25|0.4|0.3:2|2.3|1.3"],
        ),
        (
            filters.compressor,
            &["acompressor=threshold=-20dB:ratio=4:attack=5:release=50"],
        ),
        (filters.normalizer, &["loudnorm"]),
        (
            filters.nightcore,
            &["atempo=1.25", "asetrate=48000*1.25,aresample=48000"],
        ),
        (
            filters.vaporwave,
            &["atempo=0.8", "asetrate=48000*0.8,aresample=48000"],
        ),
        (filters.bassboost, &["bass=g=10"]),
        (filters.eight_d, &["apulsator=mode=sine:hz=0.125"]),
        (filters.echo, &["aecho=0.8:0.9:1000:0.3"]),
        (filters.reverb, &["aecho=0.8:0.88:60|90:0.4|0.3"]),
    ];

    for (enabled, toggle_stages) in toggles {
        if enabled {
            stages.extend(toggle_stages.iter().map(|s| (*s).to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use streamify_core::{BandFilter, Modulation, Rotation};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn config() -> FilterConfig {
        FilterConfig::default()
    }

    #[test]
    fn empty_config_has_no_stages() {
        assert!(build_stages(&config()).is_empty());
    }

    #[test]
    fn neutral_values_emit_nothing() {
        let filters = FilterConfig {
            bass: Some(0.0),
            treble: Some(0.0),
            speed: Some(1.0),
            pitch: Some(1.0),
            volume: Some(100.0),
            lowpass: Some(0.0),
            ..config()
        };
        assert!(build_stages(&filters).is_empty());
    }

    #[test]
    fn numeric_filters_are_clamped() {
        let filters = FilterConfig {
            bass: Some(-50.0),
            treble: Some(50.0),
            speed: Some(5.0),
            pitch: Some(0.1),
            volume: Some(500.0),
            lowpass: Some(10.0),
            highpass: Some(50000.0),
            ..config()
        };
        assert_eq!(
            build_stages(&filters),
            vec![
                "bass=g=-20",
                "treble=g=20",
                "atempo=2",
                "asetrate=48000*0.5,aresample=48000",
                "volume=2",
                "lowpass=f=100",
                "highpass=f=10000",
            ]
        );
    }

    #[test]
    fn volume_maps_percent_to_multiplier() {
        let filters = FilterConfig {
            volume: Some(50.0),
            ..config()
        };
        assert_eq!(build_stages(&filters), vec!["volume=0.5"]);

        let filters = FilterConfig {
            volume: Some(-10.0),
            ..config()
        };
        assert_eq!(build_stages(&filters), vec!["volume=0"]);
    }

    #[test]
    fn modulation_defaults_and_clamps() {
        let filters = FilterConfig {
            tremolo: Some(Modulation::default()),
            vibrato: Some(Modulation {
                frequency: Some(100.0),
                depth: Some(5.0),
            }),
            rotation: Some(Rotation::default()),
            ..config()
        };
        assert_eq!(
            build_stages(&filters),
            vec![
                "tremolo=f=4:d=0.5",
                "vibrato=f=14:d=1",
                "apulsator=mode=sine:hz=0.125:width=1",
            ]
        );
    }

    #[test]
    fn band_filters_use_defaults() {
        let filters = FilterConfig {
            bandpass: Some(BandFilter::default()),
            bandreject: Some(BandFilter {
                frequency: Some(440.0),
                width: None,
            }),
            ..config()
        };
        assert_eq!(
            build_stages(&filters),
            vec![
                "bandpass=f=1000:width_type=h:width=200",
                "bandreject=f=440:width_type=h:width=200",
            ]
        );
    }

    #[test]
    fn equalizer_comes_before_preset_and_bass() {
        let filters = FilterConfig {
            equalizer: Some(vec![0.5]),
            preset: Some("bass_heavy".to_string()),
            bass: Some(5.0),
            ..config()
        };
        let stages = build_stages(&filters);
        assert_eq!(stages[0], "equalizer=f=25:width_type=h:width=12.5:g=6");
        assert!(stages[1].starts_with("equalizer=f=25"));
        assert_eq!(stages.last().map(String::as_str), Some("bass=g=5"));
    }

    #[test]
    fn unknown_preset_is_ignored() {
        let filters = FilterConfig {
            preset: Some("dubstep".to_string()),
            ..config()
        };
        assert!(build_stages(&filters).is_empty());
    }

    #[test]
    fn unknown_preset_is_logged() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Recorder(events.clone()));
        let filters = FilterConfig {
            preset: Some("dubstep".to_string()),
            bass: Some(3.0),
            ..config()
        };

        let stages = tracing::subscriber::with_default(subscriber, || build_stages(&filters));

        assert_eq!(stages, vec!["bass=g=3".to_string()]);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("preset=dubstep"), "got {}", events[0]);
    }

    #[test]
    fn known_preset_is_not_logged() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Recorder(events.clone()));
        let filters = FilterConfig {
            preset: Some("rock".to_string()),
            ..config()
        };

        let stages = tracing::subscriber::with_default(subscriber, || build_stages(&filters));

        assert!(!stages.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for Recorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = Fields::default();
            event.record(&mut fields);
            self.0.lock().unwrap().push(fields.0);
        }
    }

    #[derive(Default)]
    struct Fields(String);

    impl Visit for Fields {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }

    #[test]
    fn toggles_follow_numeric_stages_in_fixed_order() {
        let filters = FilterConfig {
            reverb: true,
            karaoke: true,
            nightcore: true,
            bass: Some(3.0),
            ..config()
        };
        assert_eq!(
            build_stages(&filters),
            vec![
                "bass=g=3",
                "pan=stereo|c0=c0-c1|c1=c1-c0",
                "atempo=1.25",
                "asetrate=48000*1.25,aresample=48000",
                "aecho=0.8:0.88:60|90:0.4|0.3",
            ]
        );
    }
}
