//! In-memory pipelines and engine shared by the player tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streamify_core::{FilterConfig, RelatedTracks, Track, TrackSource};
use streamify_pipeline::{
    AudioStream, CancelHandle, PipelineError, PipelineFactory, PipelineMetrics, PipelineState,
    StreamId, TrackPipeline,
};
use streamify_playback::{PlaybackEngine, Player, PlayerConfig, PlayerEvent, PlayerServices};
use tokio::sync::broadcast;

// ===== Pipelines =====

/// Everything the fake pipelines did, plus knobs to make them misbehave
#[derive(Default)]
pub struct Log {
    pub builds: Mutex<Vec<(String, FilterConfig)>>,
    pub creates: Mutex<Vec<(String, u64)>>,
    pub destroyed: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl Log {
    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn delay(&self, id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(id.to_string(), delay);
    }

    pub fn builds_of(&self, id: &str) -> usize {
        self.builds.lock().unwrap().iter().filter(|(t, _)| t == id).count()
    }

    pub fn creates_of(&self, id: &str) -> Vec<u64> {
        self.creates
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == id)
            .map(|(_, seek)| *seek)
            .collect()
    }

    pub fn last_filters(&self) -> FilterConfig {
        self.builds.lock().unwrap().last().unwrap().1.clone()
    }
}

pub struct FakePipeline {
    track: Track,
    state: PipelineState,
    cancel: CancelHandle,
    stream: Option<AudioStream>,
    log: Arc<Log>,
}

#[async_trait]
impl TrackPipeline for FakePipeline {
    async fn create(&mut self, seek_ms: u64) -> streamify_pipeline::Result<AudioStream> {
        if self.cancel.is_cancelled() {
            self.state = PipelineState::Destroyed;
            return Err(PipelineError::Destroyed);
        }
        if let Some(stream) = &self.stream {
            return Ok(stream.clone());
        }

        self.state = PipelineState::Starting;
        self.log
            .creates
            .lock()
            .unwrap()
            .push((self.track.id.clone(), seek_ms));

        let delay = self
            .log
            .delays
            .lock()
            .unwrap()
            .get(&self.track.id)
            .copied()
            .unwrap_or(Duration::ZERO);
        let cancel = self.cancel.clone();
        let cancelled = tokio::select! {
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
        };
        if cancelled {
            self.state = PipelineState::Destroyed;
            return Err(PipelineError::Destroyed);
        }

        if self.log.failing.lock().unwrap().contains(&self.track.id) {
            self.state = PipelineState::Idle;
            return Err(PipelineError::Extraction("Video unavailable".to_string()));
        }

        let stream = AudioStream::new(tokio::io::empty());
        self.stream = Some(stream.clone());
        self.state = PipelineState::Ready;
        Ok(stream)
    }

    fn destroy(&mut self) {
        if self.state != PipelineState::Destroyed {
            self.state = PipelineState::Destroyed;
            self.cancel.cancel();
            self.log.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn state(&self) -> PipelineState {
        if self.cancel.is_cancelled() {
            PipelineState::Destroyed
        } else {
            self.state
        }
    }

    fn track(&self) -> &Track {
        &self.track
    }

    fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics::default()
    }
}

pub struct FakeFactory(pub Arc<Log>);

impl PipelineFactory for FakeFactory {
    fn build(&self, track: &Track, filters: &FilterConfig) -> Box<dyn TrackPipeline> {
        self.0
            .builds
            .lock()
            .unwrap()
            .push((track.id.clone(), filters.clone()));
        Box::new(FakePipeline {
            track: track.clone(),
            state: PipelineState::Idle,
            cancel: CancelHandle::new(),
            stream: None,
            log: self.0.clone(),
        })
    }
}

// ===== Engine =====

#[derive(Default)]
pub struct FakeEngine {
    pub plays: Mutex<Vec<StreamId>>,
    pub stops: AtomicUsize,
    pub pauses: AtomicUsize,
    pub unpauses: AtomicUsize,
}

impl FakeEngine {
    pub fn last_stream(&self) -> StreamId {
        *self.plays.lock().unwrap().last().unwrap()
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }
}

impl PlaybackEngine for FakeEngine {
    fn play(&self, stream: AudioStream) {
        self.plays.lock().unwrap().push(stream.id());
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn unpause(&self) {
        self.unpauses.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ===== Related tracks =====

pub struct FixedRelated(pub Vec<Track>);

#[async_trait]
impl RelatedTracks for FixedRelated {
    async fn related(&self, _seed: &Track, limit: usize) -> streamify_core::Result<Vec<Track>> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

// ===== Harness =====

pub struct Harness {
    pub player: Arc<Player>,
    pub engine: Arc<FakeEngine>,
    pub log: Arc<Log>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

impl Harness {
    pub fn new(config: PlayerConfig) -> Self {
        Self::with_related(config, None)
    }

    pub fn with_related(config: PlayerConfig, related: Option<Arc<dyn RelatedTracks>>) -> Self {
        let log = Arc::new(Log::default());
        let engine = Arc::new(FakeEngine::default());
        let services = PlayerServices {
            factory: Arc::new(FakeFactory(log.clone())),
            engine: engine.clone(),
            related,
            status: None,
        };
        let player = Player::new("guild-1", &config, services);
        let events = player.subscribe();
        Self {
            player,
            engine,
            log,
            events,
        }
    }

    /// Events received since the last call
    pub fn events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn event_names(&mut self) -> Vec<&'static str> {
        self.events().iter().map(PlayerEvent::name).collect()
    }
}

pub fn track(id: &str) -> Track {
    Track::new(id, format!("Song {id}"), TrackSource::Youtube)
        .with_duration(Duration::from_secs(180))
}

/// Player config with every background behaviour switched off
pub fn quiet_config() -> PlayerConfig {
    let mut config = PlayerConfig::default();
    config.auto_leave.enabled = false;
    config
}
