//! Streamify Pipeline - per-track audio stream production
//!
//! Turns a [`Track`](streamify_core::Track) plus a
//! [`FilterConfig`](streamify_core::FilterConfig) into an encoded audio
//! stream by running an extractor process piped into a transcoder process.
//!
//! ```no_run
//! use streamify_core::{FilterConfig, Track, TrackSource};
//! use streamify_pipeline::{PipelineConfig, PipelineFactory, ProcessPipelineFactory};
//!
//! # async fn run() -> streamify_pipeline::Result<()> {
//! let factory = ProcessPipelineFactory::new(PipelineConfig::default());
//! let track = Track::new("dQw4w9WgXcQ", "Song", TrackSource::Youtube);
//!
//! let mut pipeline = factory.build(&track, &FilterConfig::default());
//! let stream = pipeline.create(0).await?;
//! let _reader = stream.take_reader();
//! pipeline.destroy();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod extractor;
pub mod factory;
pub mod metrics;
pub mod pipeline;
pub mod stream;

pub use config::{
    ExtractorSettings, PipelineConfig, ReadinessSettings, SponsorBlockSettings,
    TranscoderSettings,
};
pub use error::{PipelineError, Result};
pub use factory::{PipelineFactory, ProcessPipelineFactory};
pub use metrics::PipelineMetrics;
pub use pipeline::{CancelHandle, Pipeline, PipelineState, ShutdownReason, TrackPipeline};
pub use stream::{AudioReader, AudioStream, StreamId};
