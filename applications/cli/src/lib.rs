//! Streamify CLI Library
//!
//! Configuration loading, input parsing and a file/stdout playback engine
//! for the `streamify` binary. Exposed as a library for testing.

pub mod config;
pub mod engine;
pub mod error;
pub mod input;

pub use config::StreamifyConfig;
pub use engine::{LogStatusSink, SinkEngine};
pub use error::{ConfigError, Result};
pub use input::{parse_source, parse_track};
