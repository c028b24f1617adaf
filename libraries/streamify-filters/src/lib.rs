//! Streamify - Filter Chain Builder
//!
//! Deterministic, side-effect-free mapping from a [`FilterConfig`] to the
//! transcoder's argument vector.
//!
//! This crate provides:
//! - Clamped numeric filters (bass, treble, speed, pitch, volume, ...)
//! - A 15-band equalizer with 17 named presets
//! - 21 effect presets applied with an intensity scalar
//! - Output codec selection (opus, mp3, aac)
//!
//! # Example
//!
//! ```rust
//! use streamify_core::FilterConfig;
//! use streamify_filters::{build_transcoder_args, OutputConfig, TranscoderInput};
//!
//! let filters = FilterConfig {
//!     bass: Some(10.0),
//!     volume: Some(50.0),
//!     ..Default::default()
//! };
//!
//! let args = build_transcoder_args(&filters, &OutputConfig::default(), &TranscoderInput::Pipe);
//! assert!(args.contains(&"bass=g=10,volume=0.5".to_string()));
//! ```
//!
//! [`FilterConfig`]: streamify_core::FilterConfig

mod args;
mod catalogue;
mod effects;
mod eq;
mod error;
mod output;
pub mod stages;

// Public exports
pub use args::{build_transcoder_args, filter_chain, TranscoderInput};
pub use catalogue::{available_filters, FilterInfo, FilterKind};
pub use effects::{apply_effect_preset, combine_effects, EffectPreset, EffectSelection};
pub use eq::{equalizer_stages, EqPreset, EQ_BANDS};
pub use error::{FilterError, Result};
pub use output::{OutputConfig, OutputFormat};
pub use stages::build_stages;
