//! Pipeline construction seam
//!
//! The player never spawns processes itself. It asks a [`PipelineFactory`]
//! for a fresh [`TrackPipeline`] every time it needs one, which lets tests
//! substitute in-memory pipelines.

use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, TrackPipeline};
use std::sync::Arc;
use streamify_core::{FilterConfig, Track, TrackResolver};

/// Builds pipelines for tracks
pub trait PipelineFactory: Send + Sync {
    /// A new, idle pipeline for `track` with `filters` applied
    fn build(&self, track: &Track, filters: &FilterConfig) -> Box<dyn TrackPipeline>;
}

/// Factory for extractor + transcoder process pipelines
#[derive(Clone)]
pub struct ProcessPipelineFactory {
    config: Arc<PipelineConfig>,
    resolver: Option<Arc<dyn TrackResolver>>,
}

impl ProcessPipelineFactory {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            resolver: None,
        }
    }

    /// Use `resolver` for tracks that need a cross-source id
    pub fn with_resolver(mut self, resolver: Arc<dyn TrackResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl PipelineFactory for ProcessPipelineFactory {
    fn build(&self, track: &Track, filters: &FilterConfig) -> Box<dyn TrackPipeline> {
        Box::new(Pipeline::new(
            track.clone(),
            filters.clone(),
            self.config.clone(),
            self.resolver.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineState;
    use streamify_core::TrackSource;

    #[test]
    fn built_pipelines_start_idle() {
        let factory = ProcessPipelineFactory::new(PipelineConfig::default());
        let track = Track::new("abc", "Song", TrackSource::Youtube);
        let pipeline = factory.build(&track, &FilterConfig::default());

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.track().id, "abc");
    }
}
