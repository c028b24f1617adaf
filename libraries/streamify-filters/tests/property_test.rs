//! Property-based tests for the filter chain builder
//!
//! Every clamped numeric field must land inside its documented range no
//! matter what the caller passes in.

use proptest::prelude::*;
use streamify_core::{FilterConfig, Modulation};
use streamify_filters::{build_stages, build_transcoder_args, OutputConfig, TranscoderInput};

// ===== Helpers =====

/// Pull the numeric value following `prefix` out of a stage
fn value_after(stage: &str, prefix: &str) -> Option<f64> {
    let rest = stage.strip_prefix(prefix)?;
    let end = rest.find(|c: char| c == ':' || c == ',').unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn stage_values(stages: &[String], prefix: &str) -> Vec<f64> {
    stages
        .iter()
        .filter_map(|s| value_after(s, prefix))
        .collect()
}

fn wild() -> impl Strategy<Value = f64> {
    -100_000.0f64..100_000.0
}

// ===== Property Tests =====

proptest! {
    /// Property: scalar filters never leave their range
    #[test]
    fn scalar_filters_stay_in_range(
        bass in wild(),
        treble in wild(),
        speed in wild(),
        pitch in wild(),
        volume in wild(),
        lowpass in wild(),
        highpass in wild(),
    ) {
        let filters = FilterConfig {
            bass: Some(bass),
            treble: Some(treble),
            speed: Some(speed),
            pitch: Some(pitch),
            volume: Some(volume),
            lowpass: Some(lowpass),
            highpass: Some(highpass),
            ..Default::default()
        };
        let stages = build_stages(&filters);

        for v in stage_values(&stages, "bass=g=") {
            prop_assert!((-20.0..=20.0).contains(&v));
        }
        for v in stage_values(&stages, "treble=g=") {
            prop_assert!((-20.0..=20.0).contains(&v));
        }
        for v in stage_values(&stages, "atempo=") {
            prop_assert!((0.5..=2.0).contains(&v), "speed {}", v);
        }
        for v in stage_values(&stages, "asetrate=48000*") {
            prop_assert!((0.5..=2.0).contains(&v), "pitch {}", v);
        }
        for v in stage_values(&stages, "volume=") {
            prop_assert!((0.0..=2.0).contains(&v), "volume {}", v);
        }
        for v in stage_values(&stages, "lowpass=f=") {
            prop_assert!((100.0..=20000.0).contains(&v));
        }
        for v in stage_values(&stages, "highpass=f=") {
            prop_assert!((20.0..=10000.0).contains(&v));
        }
    }

    /// Property: equalizer gains are clamped and zero bands are dropped
    #[test]
    fn equalizer_gains_stay_in_range(bands in prop::collection::vec(-5.0f64..5.0, 0..30)) {
        let filters = FilterConfig {
            equalizer: Some(bands.clone()),
            ..Default::default()
        };
        let stages = build_stages(&filters);

        let non_zero = bands.iter().take(15).filter(|g| **g != 0.0).count();
        prop_assert_eq!(stages.len(), non_zero);

        for stage in &stages {
            let gain: f64 = stage.rsplit("g=").next().unwrap().parse().unwrap();
            prop_assert!((-3.0..=12.0).contains(&gain), "gain {}", gain);
        }
    }

    /// Property: tremolo frequency and depth stay in range
    #[test]
    fn tremolo_stays_in_range(frequency in wild(), depth in wild()) {
        let filters = FilterConfig {
            tremolo: Some(Modulation { frequency: Some(frequency), depth: Some(depth) }),
            ..Default::default()
        };
        let stages = build_stages(&filters);
        prop_assert_eq!(stages.len(), 1);

        let f = value_after(&stages[0], "tremolo=f=").unwrap();
        let d: f64 = stages[0].rsplit("d=").next().unwrap().parse().unwrap();
        prop_assert!((0.1..=20.0).contains(&f));
        prop_assert!((0.0..=1.0).contains(&d));
    }

    /// Property: the argument vector always ends with the stdout sink
    #[test]
    fn args_always_end_with_stdout(volume in wild(), karaoke in any::<bool>()) {
        let filters = FilterConfig {
            volume: Some(volume),
            karaoke,
            ..Default::default()
        };
        let args = build_transcoder_args(&filters, &OutputConfig::default(), &TranscoderInput::Pipe);
        prop_assert_eq!(args.last().map(String::as_str), Some("-"));
        prop_assert_eq!(args.iter().filter(|a| *a == "-af").count(), usize::from(volume != 100.0 || karaoke));
    }
}
