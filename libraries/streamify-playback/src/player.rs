//! Per-session player
//!
//! A [`Player`] owns a queue, at most one exposed pipeline and at most one
//! prefetched pipeline for the next track. Every operation that builds a
//! pipeline takes a generation number first; a build whose generation has
//! been superseded by the time it finishes is destroyed instead of exposed.
//!
//! ```text
//!            play / resume / skip
//!   Idle ───────────────────────────▶ Loading ──▶ Playing ◀──▶ Paused
//!    ▲                                  │            │
//!    └───────── queue end / stop ───────┴────────────┘
//! ```
//!
//! The state lock is a synchronous mutex and is never held across an
//! `.await`. Engine methods are called with it held.

use crate::clock::PositionClock;
use crate::config::{
    AutoLeaveConfig, AutoPauseConfig, AutoplayConfig, PlayerConfig, MAX_VOLUME,
};
use crate::engine::{EngineSignal, PlaybackEngine};
use crate::error::{PlayerError, Result};
use crate::events::{PlayerEvent, TrackEndReason};
use crate::guard::{is_held, FlagGuard};
use crate::queue::{PlaybackQueue, QueueSnapshot};
use crate::status::VoiceStatus;
use crate::types::{PlayerState, RepeatMode};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use streamify_core::{FilterConfig, RelatedTracks, Track};
use streamify_filters::{combine_effects, EffectSelection, EqPreset, FilterError, EQ_BANDS};
use streamify_pipeline::{AudioStream, CancelHandle, PipelineFactory, StreamId, TrackPipeline};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Consecutive build failures tolerated before giving up on the queue
pub const MAX_CONSECUTIVE_FAILURES: usize = 10;

const EVENT_CAPACITY: usize = 256;

/// Collaborators a player needs
#[derive(Clone)]
pub struct PlayerServices {
    pub factory: Arc<dyn PipelineFactory>,
    pub engine: Arc<dyn PlaybackEngine>,
    /// Source of autoplay tracks; autoplay is inert without one
    pub related: Option<Arc<dyn RelatedTracks>>,
    pub status: Option<VoiceStatus>,
}

/// Options for [`Player::play`]
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Replace the current track instead of moving it to history
    pub replace: bool,
    pub start_ms: u64,
    pub volume: Option<u16>,
    /// Replaces the user filters before the build
    pub filters: Option<FilterConfig>,
}

/// Serialisable view of a player
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub session_id: String,
    pub state: PlayerState,
    pub position_ms: u64,
    pub volume: u16,
    pub autoplay: bool,
    pub auto_paused: bool,
    pub filters: FilterConfig,
    pub effect_presets: Vec<EffectSelection>,
    pub queue: QueueSnapshot,
}

enum StartOutcome {
    Started,
    /// A newer operation took over
    Superseded,
    /// The build failed; `next` is the following track, if it should be tried
    Failed { next: Option<Track> },
}

struct Prefetched {
    track_id: String,
    pipeline: Box<dyn TrackPipeline>,
}

struct PrefetchTask {
    seq: u64,
    track_id: String,
    cancel: CancelHandle,
}

struct Inner {
    state: PlayerState,
    queue: PlaybackQueue,

    current: Option<Box<dyn TrackPipeline>>,
    current_stream: Option<StreamId>,
    /// Whether `TrackStart` went out for the current track
    announced: bool,

    generation: u64,
    building: Option<CancelHandle>,
    /// Signal for the exposed stream that arrived during a rebuild
    deferred_signal: Option<EngineSignal>,

    prefetch: Option<Prefetched>,
    prefetch_task: Option<PrefetchTask>,
    prefetch_seq: u64,

    volume: u16,
    filters: FilterConfig,
    effects: Vec<EffectSelection>,
    effect_filters: FilterConfig,

    clock: PositionClock,

    empty_timer: Option<JoinHandle<()>>,
    inactivity_timer: Option<JoinHandle<()>>,

    auto_leave: AutoLeaveConfig,
    auto_pause: AutoPauseConfig,
    autoplay: AutoplayConfig,
}

impl Inner {
    /// Invalidate in-flight builds
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(building) = self.building.take() {
            building.cancel();
        }
        self.generation
    }

    /// Effect presets under the user filters, at the player volume
    ///
    /// A volume set by an effect or filter scales the player volume.
    fn effective_filters(&self) -> FilterConfig {
        let mut filters = self.effect_filters.merged(&self.filters);
        let gain = filters.volume.unwrap_or(100.0) / 100.0;
        filters.volume =
            Some((f64::from(self.volume) * gain).clamp(0.0, f64::from(MAX_VOLUME)));
        filters
    }

    fn position(&self) -> u64 {
        match self.state {
            PlayerState::Idle | PlayerState::Destroyed => 0,
            _ => self.clock.position(),
        }
    }

    fn discard_prefetch(&mut self) {
        self.prefetch_seq += 1;
        if let Some(task) = self.prefetch_task.take() {
            task.cancel.cancel();
        }
        if let Some(mut prefetched) = self.prefetch.take() {
            prefetched.pipeline.destroy();
        }
    }

    /// Claim the prefetched pipeline if it was built for `track_id` from the
    /// start
    fn take_prefetch(
        &mut self,
        track_id: &str,
        start_ms: u64,
    ) -> Option<Box<dyn TrackPipeline>> {
        let claimed = match self.prefetch.take() {
            Some(prefetched)
                if prefetched.track_id == track_id
                    && start_ms == 0
                    && !prefetched.pipeline.is_destroyed() =>
            {
                Some(prefetched.pipeline)
            }
            Some(mut stale) => {
                stale.pipeline.destroy();
                None
            }
            None => None,
        };
        self.discard_prefetch();
        claimed
    }

    fn destroy_current(&mut self) {
        if let Some(mut pipeline) = self.current.take() {
            pipeline.destroy();
        }
        self.current_stream = None;
    }
}

fn cancel_timer(timer: &mut Option<JoinHandle<()>>) {
    if let Some(timer) = timer.take() {
        timer.abort();
    }
}

pub struct Player {
    session_id: String,
    weak_self: Weak<Player>,
    inner: Mutex<Inner>,

    factory: Arc<dyn PipelineFactory>,
    engine: Arc<dyn PlaybackEngine>,
    related: Option<Arc<dyn RelatedTracks>>,
    status: Option<VoiceStatus>,

    manual_skip: AtomicUsize,
    changing_stream: AtomicUsize,
    auto_paused: AtomicBool,
    destroyed: AtomicBool,

    events: broadcast::Sender<PlayerEvent>,
    on_destroy: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Player {
    pub fn new(
        session_id: impl Into<String>,
        config: &PlayerConfig,
        services: PlayerServices,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session_id = session_id.into();
        info!(session = %session_id, volume = config.default_volume, "Player created");

        Arc::new_cyclic(|weak_self| Self {
            session_id,
            weak_self: weak_self.clone(),
            inner: Mutex::new(Inner {
                state: PlayerState::Idle,
                queue: PlaybackQueue::new(config.max_previous_tracks),
                current: None,
                current_stream: None,
                announced: false,
                generation: 0,
                building: None,
                deferred_signal: None,
                prefetch: None,
                prefetch_task: None,
                prefetch_seq: 0,
                volume: config.default_volume.min(MAX_VOLUME),
                filters: FilterConfig::default(),
                effects: Vec::new(),
                effect_filters: FilterConfig::default(),
                clock: PositionClock::default(),
                empty_timer: None,
                inactivity_timer: None,
                auto_leave: config.auto_leave,
                auto_pause: config.auto_pause,
                autoplay: config.autoplay,
            }),
            factory: services.factory,
            engine: services.engine,
            related: services.related,
            status: services.status,
            manual_skip: AtomicUsize::new(0),
            changing_stream: AtomicUsize::new(0),
            auto_paused: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            events,
            on_destroy: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        debug!(session = %self.session_id, event = event.name(), "Player event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn set_on_destroy(&self, hook: impl FnOnce() + Send + 'static) {
        *self
            .on_destroy
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    fn transition(&self, inner: &mut Inner, next: PlayerState) -> bool {
        if !inner.state.can_transition_to(next) {
            debug!(
                session = %self.session_id,
                from = %inner.state,
                to = %next,
                "Rejected state transition"
            );
            return false;
        }
        inner.state = next;
        true
    }

    // ===== Playback =====

    /// Play `track` now
    ///
    /// Without `replace`, a current track is kept in history and `track`
    /// plays through a skip. Returns the track that ended up playing.
    pub async fn play(&self, track: Track, options: PlayOptions) -> Option<Track> {
        let start_ms = {
            let mut inner = self.lock();
            if inner.state == PlayerState::Destroyed {
                return None;
            }
            if let Some(volume) = options.volume {
                inner.volume = volume.min(MAX_VOLUME);
            }
            if let Some(filters) = options.filters {
                inner.filters = filters;
                inner.discard_prefetch();
            }

            if inner.queue.current().is_some() && !options.replace {
                inner.queue.add(track.clone(), Some(0));
                None
            } else {
                self.end_current(&mut inner, TrackEndReason::Skipped);
                inner.queue.set_current(Some(track.clone()));
                Some(options.start_ms)
            }
        };

        match start_ms {
            Some(start_ms) => self.play_from(track, start_ms).await,
            None => self.skip().await,
        }
    }

    /// Pause playback
    ///
    /// With `destroy_stream` the pipeline is torn down and rebuilt at the
    /// frozen position on resume.
    pub fn pause(&self, destroy_stream: bool) -> bool {
        self.auto_paused.store(false, Ordering::SeqCst);
        self.pause_inner(destroy_stream)
    }

    fn pause_inner(&self, destroy_stream: bool) -> bool {
        let mut inner = self.lock();
        if inner.state != PlayerState::Playing {
            return false;
        }

        let position = inner.clock.position();
        inner.clock.freeze(position);
        self.transition(&mut inner, PlayerState::Paused);
        inner.supersede();

        if destroy_stream {
            inner.destroy_current();
            inner.discard_prefetch();
            self.engine.stop();
        } else {
            self.engine.pause();
        }

        info!(session = %self.session_id, position_ms = position, destroy_stream, "Paused");
        true
    }

    pub async fn resume(&self) -> bool {
        self.resume_inner(true).await
    }

    pub(crate) async fn resume_inner(&self, user: bool) -> bool {
        let rebuild = {
            let mut inner = self.lock();
            if inner.state != PlayerState::Paused {
                return false;
            }
            if user {
                self.auto_paused.store(false, Ordering::SeqCst);
            }

            if inner.current.is_some() {
                let position = inner.clock.position();
                self.transition(&mut inner, PlayerState::Playing);
                inner.clock.start(position);
                self.engine.unpause();
                cancel_timer(&mut inner.inactivity_timer);
                info!(session = %self.session_id, position_ms = position, "Resumed");
                false
            } else {
                true
            }
        };

        if rebuild {
            self.rebuild(None).await
        } else {
            true
        }
    }

    /// Skip to the next track
    ///
    /// Returns the track now playing. An exhausted queue hands over to
    /// autoplay when enabled.
    pub async fn skip(&self) -> Option<Track> {
        let _skipping = FlagGuard::hold(&self.manual_skip);

        let (ended, next, generation) = {
            let mut inner = self.lock();
            if inner.state == PlayerState::Destroyed
                || (inner.queue.current().is_none() && inner.queue.is_empty())
            {
                return None;
            }

            let ended = inner.queue.current().cloned();
            self.end_current(&mut inner, TrackEndReason::Skipped);
            let next = inner.queue.shift();
            if next.is_none() && inner.state != PlayerState::Idle {
                self.transition(&mut inner, PlayerState::Idle);
            }
            (ended, next, inner.generation)
        };

        match next {
            Some(track) => self.play_from(track, 0).await,
            None => {
                self.finish_queue(ended, generation).await;
                None
            }
        }
    }

    /// Step back to the most recently played track
    pub async fn previous(&self) -> Option<Track> {
        let _skipping = FlagGuard::hold(&self.manual_skip);

        let track = {
            let mut inner = self.lock();
            if inner.state == PlayerState::Destroyed || inner.queue.history().is_empty() {
                return None;
            }
            self.end_current(&mut inner, TrackEndReason::Skipped);
            inner.discard_prefetch();
            inner.queue.unshift()?
        };

        self.play_from(track, 0).await
    }

    /// Stop playback and clear the pending queue
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == PlayerState::Destroyed {
            return false;
        }

        self.end_current(&mut inner, TrackEndReason::Stopped);
        inner.discard_prefetch();
        inner.queue.clear();
        inner.queue.set_current(None);
        inner.clock.reset();
        if inner.state != PlayerState::Idle {
            self.transition(&mut inner, PlayerState::Idle);
        }
        self.arm_inactivity_timer(&mut inner);
        drop(inner);

        if let Some(status) = &self.status {
            status.clear();
        }
        info!(session = %self.session_id, "Stopped");
        true
    }

    /// Restart the current track at `position_ms`
    ///
    /// Live tracks and positions past the end are rejected. While paused the
    /// new position applies on resume.
    pub async fn seek(&self, position_ms: u64) -> bool {
        {
            let inner = self.lock();
            let Some(track) = inner.queue.current() else {
                return false;
            };
            if track.is_indeterminate() || position_ms >= track.duration_ms() {
                return false;
            }
        }
        self.apply_stream_change(Some(position_ms)).await
    }

    // ===== Engine signals =====

    /// React to the engine finishing or failing a stream
    ///
    /// Signals for streams that are no longer exposed, or that arrive while a
    /// skip is in flight, are ignored. Signals arriving during a rebuild are
    /// held until the rebuild settles.
    pub async fn handle_signal(&self, signal: EngineSignal) {
        let (ended, next, generation) = {
            let mut inner = self.lock();
            if inner.current_stream != Some(signal.stream_id()) {
                debug!(session = %self.session_id, ?signal, "Ignoring signal for stale stream");
                return;
            }
            if is_held(&self.changing_stream) {
                debug!(session = %self.session_id, ?signal, "Deferring signal until rebuild settles");
                inner.deferred_signal = Some(signal);
                return;
            }
            if is_held(&self.manual_skip) {
                debug!(session = %self.session_id, ?signal, "Ignoring signal during skip");
                return;
            }
            if inner.state != PlayerState::Playing {
                return;
            }

            inner.supersede();
            inner.destroy_current();
            let ended = inner.queue.current().cloned();
            match signal {
                EngineSignal::Idle(_) => {
                    if let (true, Some(track)) = (inner.announced, ended.clone()) {
                        self.emit(PlayerEvent::TrackEnd {
                            track,
                            reason: TrackEndReason::Finished,
                        });
                    }
                }
                EngineSignal::Error(_, message) => {
                    warn!(session = %self.session_id, %message, "Playback error");
                    self.emit(PlayerEvent::TrackError {
                        track: ended.clone(),
                        message,
                    });
                }
            }
            inner.announced = false;

            let next = inner.queue.shift();
            if next.is_none() {
                self.transition(&mut inner, PlayerState::Idle);
            }
            (ended, next, inner.generation)
        };

        match next {
            Some(track) => {
                self.play_from(track, 0).await;
            }
            None => self.finish_queue(ended, generation).await,
        }
    }

    /// Feed engine signals to this player, one at a time
    pub fn attach_signals(
        self: &Arc<Self>,
        mut signals: mpsc::UnboundedReceiver<EngineSignal>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(player) = weak.upgrade() else {
                    break;
                };
                if player.is_destroyed() {
                    break;
                }
                player.handle_signal(signal).await;
            }
        })
    }

    // ===== Building and exposing =====

    /// Play `track`, moving down the queue past tracks that fail to build
    async fn play_from(&self, track: Track, start_ms: u64) -> Option<Track> {
        let mut attempt = Some((track, start_ms));
        let mut failures = 0;

        while let Some((track, start_ms)) = attempt.take() {
            match self.start_track(&track, start_ms, failures).await {
                StartOutcome::Started => return Some(track),
                StartOutcome::Superseded => return None,
                StartOutcome::Failed { next } => {
                    failures += 1;
                    attempt = next.map(|track| (track, 0));
                }
            }
        }
        None
    }

    async fn start_track(&self, track: &Track, start_ms: u64, failures: usize) -> StartOutcome {
        let (generation, mut pipeline) = {
            let mut inner = self.lock();
            if !self.transition(&mut inner, PlayerState::Loading) {
                return StartOutcome::Superseded;
            }
            let generation = inner.supersede();
            inner.announced = false;
            inner.clock.freeze(start_ms);

            let pipeline = match inner.take_prefetch(&track.id, start_ms) {
                Some(pipeline) => {
                    debug!(session = %self.session_id, track = %track.id, "Using prefetched stream");
                    pipeline
                }
                None => self.factory.build(track, &inner.effective_filters()),
            };
            inner.building = Some(pipeline.cancel_handle());
            (generation, pipeline)
        };

        let result = pipeline.create(start_ms).await;

        let mut inner = self.lock();
        if inner.generation != generation || inner.state == PlayerState::Destroyed {
            pipeline.destroy();
            return StartOutcome::Superseded;
        }
        inner.building = None;

        match result {
            Ok(stream) => {
                self.expose(&mut inner, pipeline, stream, start_ms);
                self.spawn_prefetch(&mut inner);
                StartOutcome::Started
            }
            Err(err) => {
                warn!(session = %self.session_id, track = %track.id, error = %err, "Failed to start track");
                self.emit(PlayerEvent::TrackError {
                    track: Some(track.clone()),
                    message: err.to_string(),
                });
                self.advance_after_failure(&mut inner, failures + 1)
            }
        }
    }

    fn advance_after_failure(&self, inner: &mut Inner, failures: usize) -> StartOutcome {
        if failures >= MAX_CONSECUTIVE_FAILURES {
            warn!(session = %self.session_id, failures, "Too many consecutive failures");
            inner.queue.set_current(None);
            self.end_queue(inner);
            return StartOutcome::Failed { next: None };
        }

        let next = inner.queue.shift();
        if next.is_none() {
            self.end_queue(inner);
        }
        StartOutcome::Failed { next }
    }

    /// Hand a ready stream to the engine, replacing the exposed one
    fn expose(
        &self,
        inner: &mut Inner,
        pipeline: Box<dyn TrackPipeline>,
        stream: AudioStream,
        offset_ms: u64,
    ) {
        let track = pipeline.track().clone();
        let old = inner.current.replace(pipeline);
        inner.current_stream = Some(stream.id());
        inner.deferred_signal = None;
        self.transition(inner, PlayerState::Playing);
        inner.clock.start(offset_ms);

        self.engine.play(stream);
        if let Some(mut old) = old {
            old.destroy();
        }
        cancel_timer(&mut inner.inactivity_timer);

        if !inner.announced {
            inner.announced = true;
            info!(session = %self.session_id, track = %track.title, offset_ms, "Track started");
            if let Some(status) = &self.status {
                status.track_started(&track);
            }
            self.emit(PlayerEvent::TrackStart { track });
        }
    }

    /// Rebuild the current track with the current filters
    ///
    /// The old stream keeps playing until the new one is ready. If the build
    /// fails and there is an old stream, playback carries on with it, and a
    /// signal the old stream raised in the meantime is handled then.
    async fn rebuild(&self, seek_ms: Option<u64>) -> bool {
        let changing = FlagGuard::hold(&self.changing_stream);

        let (generation, track, offset, mut pipeline, started) = {
            let mut inner = self.lock();
            let Some(track) = inner.queue.current().cloned() else {
                return false;
            };
            let offset = seek_ms.unwrap_or_else(|| inner.position());
            if !self.transition(&mut inner, PlayerState::Loading) {
                return false;
            }
            let generation = inner.supersede();
            inner.discard_prefetch();
            inner.clock.freeze(offset);

            let pipeline = self.factory.build(&track, &inner.effective_filters());
            inner.building = Some(pipeline.cancel_handle());
            (generation, track, offset, pipeline, Instant::now())
        };

        debug!(session = %self.session_id, track = %track.id, offset_ms = offset, "Rebuilding stream");
        let result = pipeline.create(offset).await;

        let (next, deferred) = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state == PlayerState::Destroyed {
                pipeline.destroy();
                return false;
            }
            inner.building = None;

            match result {
                Ok(stream) => {
                    self.expose(&mut inner, pipeline, stream, offset);
                    self.spawn_prefetch(&mut inner);
                    return true;
                }
                Err(err) => {
                    warn!(session = %self.session_id, track = %track.id, error = %err, "Failed to rebuild stream");
                    self.emit(PlayerEvent::TrackError {
                        track: Some(track),
                        message: err.to_string(),
                    });

                    if inner.current.is_some() {
                        // The old stream may have ended while the rebuild ran
                        let resumed_at = offset + started.elapsed().as_millis() as u64;
                        self.transition(&mut inner, PlayerState::Playing);
                        inner.clock.start(resumed_at);
                        (None, inner.deferred_signal.take())
                    } else {
                        match self.advance_after_failure(&mut inner, 1) {
                            StartOutcome::Failed { next } => (next, None),
                            _ => (None, None),
                        }
                    }
                }
            }
        };

        if let Some(signal) = deferred {
            drop(changing);
            self.handle_signal(signal).await;
            return false;
        }
        if let Some(next) = next {
            self.play_from(next, 0).await;
        }
        false
    }

    /// Push a filter, volume or position change to the stream
    async fn apply_stream_change(&self, seek_ms: Option<u64>) -> bool {
        {
            let mut inner = self.lock();
            inner.discard_prefetch();
            match inner.state {
                PlayerState::Playing | PlayerState::Loading => {}
                PlayerState::Paused => {
                    // Applied by the rebuild on resume
                    if let Some(position) = seek_ms {
                        inner.clock.freeze(position);
                    }
                    if inner.current.is_some() {
                        inner.destroy_current();
                        self.engine.stop();
                    }
                    return true;
                }
                PlayerState::Idle | PlayerState::Destroyed => return false,
            }
        }
        self.rebuild(seek_ms).await
    }

    // ===== Prefetch =====

    fn spawn_prefetch(&self, inner: &mut Inner) {
        if inner.state != PlayerState::Playing
            || inner.prefetch.is_some()
            || inner.prefetch_task.is_some()
            || inner.queue.repeat_mode() == RepeatMode::Track
        {
            return;
        }
        let Some(next) = inner.queue.peek_next().cloned() else {
            return;
        };
        if next.is_indeterminate() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut pipeline = self.factory.build(&next, &inner.effective_filters());
        inner.prefetch_seq += 1;
        let seq = inner.prefetch_seq;
        inner.prefetch_task = Some(PrefetchTask {
            seq,
            track_id: next.id.clone(),
            cancel: pipeline.cancel_handle(),
        });

        let weak = self.weak_self.clone();
        let session = self.session_id.clone();
        runtime.spawn(async move {
            let result = pipeline.create(0).await;

            let Some(player) = weak.upgrade() else {
                pipeline.destroy();
                return;
            };
            let mut inner = player.lock();
            let current = inner.prefetch_task.as_ref().is_some_and(|task| task.seq == seq);
            if current {
                inner.prefetch_task = None;
            }

            match result {
                Ok(_)
                    if current
                        && !player.is_destroyed()
                        && inner.queue.peek_next().is_some_and(|track| track.id == next.id) =>
                {
                    debug!(session = %session, track = %next.id, "Prefetched next track");
                    inner.prefetch = Some(Prefetched {
                        track_id: next.id.clone(),
                        pipeline,
                    });
                }
                Ok(_) => pipeline.destroy(),
                Err(err) => {
                    debug!(session = %session, track = %next.id, error = %err, "Prefetch failed");
                    pipeline.destroy();
                }
            }
        });
    }

    /// Drop a prefetch that no longer matches the next track and start one
    /// if none is running
    fn refresh_prefetch(&self, inner: &mut Inner) {
        let next_id = inner.queue.peek_next().map(|track| track.id.clone());
        let stale = inner
            .prefetch
            .as_ref()
            .map(|prefetched| &prefetched.track_id)
            .or(inner.prefetch_task.as_ref().map(|task| &task.track_id))
            .is_some_and(|id| Some(id) != next_id.as_ref());
        if stale {
            inner.discard_prefetch();
        }
        self.spawn_prefetch(inner);
    }

    // ===== Queue end and autoplay =====

    /// Tear down the exposed track, announcing its end
    fn end_current(&self, inner: &mut Inner, reason: TrackEndReason) {
        inner.supersede();
        let had_stream = inner.current.is_some();
        inner.destroy_current();
        if had_stream {
            self.engine.stop();
        }

        if inner.announced {
            inner.announced = false;
            if let Some(track) = inner.queue.current().cloned() {
                self.emit(PlayerEvent::TrackEnd { track, reason });
            }
        }
    }

    fn end_queue(&self, inner: &mut Inner) {
        if inner.state != PlayerState::Idle {
            self.transition(inner, PlayerState::Idle);
        }
        inner.clock.reset();
        self.arm_inactivity_timer(inner);
        info!(session = %self.session_id, "Queue ended");
        self.emit(PlayerEvent::QueueEnd);
    }

    /// Called once nothing is left to play
    async fn finish_queue(&self, seed: Option<Track>, generation: u64) {
        let autoplay = self.lock().autoplay;
        if let (true, Some(seed), Some(related)) = (autoplay.enabled, seed, self.related.clone()) {
            if self.autoplay(seed, related.as_ref(), autoplay.max_tracks, generation).await {
                return;
            }
        }

        let mut inner = self.lock();
        if inner.generation == generation && inner.state != PlayerState::Destroyed {
            self.end_queue(&mut inner);
        }
    }

    /// Queue tracks related to `seed` and play the first
    ///
    /// Returns `true` if autoplay took over, or if another operation did
    /// while the lookup ran.
    async fn autoplay(
        &self,
        seed: Track,
        related: &dyn RelatedTracks,
        limit: usize,
        generation: u64,
    ) -> bool {
        info!(session = %self.session_id, seed = %seed.title, "Autoplay looking for related tracks");
        self.emit(PlayerEvent::AutoplayStart { seed: seed.clone() });

        let tracks = match related.related(&seed, limit).await {
            Ok(tracks) => tracks,
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "Autoplay lookup failed");
                Vec::new()
            }
        };

        let first = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state == PlayerState::Destroyed {
                return true;
            }
            let mut tracks = tracks.into_iter().map(|mut track| {
                track.is_autoplay = true;
                track
            });
            let Some(first) = tracks.next() else {
                return false;
            };
            let rest: Vec<Track> = tracks.collect();
            inner.queue.set_current(Some(first.clone()));
            inner.queue.add_many(rest.iter().cloned(), None);

            let mut added = Vec::with_capacity(rest.len() + 1);
            added.push(first.clone());
            added.extend(rest);
            info!(session = %self.session_id, count = added.len(), "Autoplay added tracks");
            self.emit(PlayerEvent::AutoplayAdd { tracks: added });
            first
        };

        self.play_from(first, 0).await;
        true
    }

    // ===== Filters and volume =====

    /// Set the volume in percent, clamped to 0..=200
    ///
    /// Returns the volume now in effect.
    pub async fn set_volume(&self, volume: u16) -> u16 {
        let volume = volume.min(MAX_VOLUME);
        {
            let mut inner = self.lock();
            if inner.state == PlayerState::Destroyed || inner.volume == volume {
                return inner.volume;
            }
            inner.volume = volume;
        }
        self.apply_stream_change(None).await;
        volume
    }

    /// Set one filter by name
    ///
    /// `null` clears it. Returns whether the change reached the stream.
    ///
    /// # Errors
    /// Returns [`PlayerError::Filter`] for unknown names or bad values
    pub async fn set_filter(&self, name: &str, value: Value) -> Result<bool> {
        {
            let mut inner = self.lock();
            inner.filters = inner.filters.with_filter(name, value)?;
        }
        Ok(self.apply_stream_change(None).await)
    }

    pub async fn clear_filters(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.filters.is_empty() {
                return false;
            }
            inner.filters = FilterConfig::default();
        }
        self.apply_stream_change(None).await
    }

    /// Set the 15 equalizer band gains, replacing any preset
    ///
    /// # Errors
    /// Returns [`PlayerError::InvalidEqualizer`] unless exactly one gain per
    /// band is given
    pub async fn set_eq(&self, bands: Vec<f64>) -> Result<bool> {
        if bands.len() != EQ_BANDS.len() {
            return Err(PlayerError::InvalidEqualizer(bands.len()));
        }
        {
            let mut inner = self.lock();
            inner.filters.preset = None;
            inner.filters.equalizer = Some(bands);
        }
        Ok(self.apply_stream_change(None).await)
    }

    /// Apply a named equalizer preset, replacing any custom bands
    ///
    /// # Errors
    /// Returns [`PlayerError::UnknownPreset`] for names not in the preset list
    pub async fn set_preset(&self, name: &str) -> Result<bool> {
        let preset = EqPreset::from_name(name).ok_or_else(|| PlayerError::UnknownPreset {
            name: name.to_string(),
            available: EqPreset::ALL.iter().map(EqPreset::name).collect::<Vec<_>>().join(", "),
        })?;
        {
            let mut inner = self.lock();
            inner.filters.equalizer = None;
            inner.filters.preset = Some(preset.name().to_string());
        }
        Ok(self.apply_stream_change(None).await)
    }

    pub async fn clear_eq(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.filters.equalizer.is_none() && inner.filters.preset.is_none() {
                return false;
            }
            inner.filters.equalizer = None;
            inner.filters.preset = None;
        }
        self.apply_stream_change(None).await
    }

    /// Apply effect presets
    ///
    /// With `replace` the list replaces the active presets; otherwise it is
    /// layered on top, a preset given again taking its new intensity.
    ///
    /// # Errors
    /// Returns [`PlayerError::UnknownEffect`] if any name is not a preset
    pub async fn set_effect_presets(
        &self,
        presets: Vec<EffectSelection>,
        replace: bool,
    ) -> Result<bool> {
        {
            let mut inner = self.lock();
            let mut effects = if replace { Vec::new() } else { inner.effects.clone() };
            for preset in presets {
                effects.retain(|active| active.name != preset.name);
                effects.push(preset);
            }

            let combined = combine_effects(&effects).map_err(|err| match err {
                FilterError::UnknownEffect(name) => PlayerError::UnknownEffect(name),
                other => PlayerError::UnknownEffect(other.to_string()),
            })?;
            inner.effects = effects;
            inner.effect_filters = combined;
        }
        Ok(self.apply_stream_change(None).await)
    }

    pub async fn clear_effect_presets(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.effects.is_empty() {
                return false;
            }
            inner.effects.clear();
            inner.effect_filters = FilterConfig::default();
        }
        self.apply_stream_change(None).await
    }

    // ===== Queue =====

    /// Add `track` at `position`, or at the end
    pub fn add(&self, track: Track, position: Option<usize>) -> usize {
        let mut inner = self.lock();
        let len = inner.queue.add(track, position);
        self.refresh_prefetch(&mut inner);
        len
    }

    pub fn add_many(&self, tracks: Vec<Track>, position: Option<usize>) -> usize {
        let mut inner = self.lock();
        let len = inner.queue.add_many(tracks, position);
        self.refresh_prefetch(&mut inner);
        len
    }

    pub fn remove(&self, index: usize) -> Option<Track> {
        let mut inner = self.lock();
        let removed = inner.queue.remove(index);
        if removed.is_some() {
            self.refresh_prefetch(&mut inner);
        }
        removed
    }

    pub fn move_track(&self, from: usize, to: usize) -> bool {
        let mut inner = self.lock();
        let moved = inner.queue.move_track(from, to);
        if moved {
            self.refresh_prefetch(&mut inner);
        }
        moved
    }

    pub fn shuffle(&self) -> usize {
        let mut inner = self.lock();
        let len = inner.queue.shuffle();
        self.refresh_prefetch(&mut inner);
        len
    }

    /// Drop all pending tracks
    pub fn clear_queue(&self) -> usize {
        let mut inner = self.lock();
        inner.discard_prefetch();
        inner.queue.clear()
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        let mut inner = self.lock();
        inner.queue.set_repeat_mode(mode);
        if mode == RepeatMode::Track {
            inner.discard_prefetch();
        } else {
            self.spawn_prefetch(&mut inner);
        }
    }

    pub fn set_autoplay(&self, enabled: bool) -> bool {
        self.lock().autoplay.enabled = enabled;
        enabled
    }

    pub fn set_auto_pause(&self, enabled: bool) -> bool {
        self.lock().auto_pause.enabled = enabled;
        if !enabled {
            self.auto_paused.store(false, Ordering::SeqCst);
        }
        enabled
    }

    // ===== Presence =====

    pub(crate) fn auto_pause_config(&self) -> AutoPauseConfig {
        self.lock().auto_pause
    }

    pub(crate) fn auto_leave_config(&self) -> AutoLeaveConfig {
        self.lock().auto_leave
    }

    /// Pause because listeners left; a later [`Player::auto_resume`] undoes it
    pub(crate) fn auto_pause(&self) -> bool {
        if self.auto_paused.load(Ordering::SeqCst) || !self.pause_inner(true) {
            return false;
        }
        self.auto_paused.store(true, Ordering::SeqCst);
        true
    }

    /// Resume only if the pause came from [`Player::auto_pause`]
    pub(crate) async fn auto_resume(&self) -> bool {
        if !self.auto_paused.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.resume_inner(false).await
    }

    /// Destroy the player after the empty-channel delay unless cancelled
    pub(crate) fn start_empty_timer(&self) {
        let mut inner = self.lock();
        if inner.empty_timer.is_some() || inner.state == PlayerState::Destroyed {
            return;
        }
        let delay = inner.auto_leave.empty_delay();
        inner.empty_timer = self.spawn_timer(delay, |player| {
            info!(session = %player.session_id, "Leaving empty channel");
            player.destroy();
        });
    }

    pub(crate) fn cancel_empty_timer(&self) {
        cancel_timer(&mut self.lock().empty_timer);
    }

    fn arm_inactivity_timer(&self, inner: &mut Inner) {
        cancel_timer(&mut inner.inactivity_timer);
        if !inner.auto_leave.enabled || inner.auto_leave.inactivity_timeout_ms == 0 {
            return;
        }
        let timeout = inner.auto_leave.inactivity_timeout();
        inner.inactivity_timer = self.spawn_timer(timeout, |player| {
            if !player.is_playing() {
                info!(session = %player.session_id, "Leaving after inactivity");
                player.destroy();
            }
        });
    }

    fn spawn_timer(
        &self,
        delay: Duration,
        action: impl FnOnce(Arc<Player>) + Send + 'static,
    ) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let weak = self.weak_self.clone();
        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(player) = weak.upgrade() {
                action(player);
            }
        }))
    }

    // ===== Teardown =====

    /// Tear everything down; idempotent
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut inner = self.lock();
            inner.state = PlayerState::Destroyed;
            inner.supersede();
            cancel_timer(&mut inner.empty_timer);
            cancel_timer(&mut inner.inactivity_timer);
            inner.discard_prefetch();
            inner.destroy_current();
            inner.queue.clear();
            inner.queue.set_current(None);
            inner.clock.reset();
            self.engine.stop();
        }

        if let Some(status) = &self.status {
            status.clear();
        }
        info!(session = %self.session_id, "Player destroyed");
        self.emit(PlayerEvent::Destroy);

        let hook = self
            .on_destroy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }

    // ===== Queries =====

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> PlayerState {
        self.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlayerState::Paused
    }

    pub fn is_auto_paused(&self) -> bool {
        self.auto_paused.load(Ordering::SeqCst)
    }

    /// Playback position in milliseconds; zero when idle
    pub fn position(&self) -> u64 {
        self.lock().position()
    }

    pub fn volume(&self) -> u16 {
        self.lock().volume
    }

    /// User filters, without effect presets or volume
    pub fn filters(&self) -> FilterConfig {
        self.lock().filters.clone()
    }

    /// Filters the next build would use
    pub fn effective_filters(&self) -> FilterConfig {
        self.lock().effective_filters()
    }

    pub fn active_effect_presets(&self) -> Vec<EffectSelection> {
        self.lock().effects.clone()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.lock().queue.current().cloned()
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.lock().queue.snapshot()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let inner = self.lock();
        PlayerSnapshot {
            session_id: self.session_id.clone(),
            state: inner.state,
            position_ms: inner.position(),
            volume: inner.volume,
            autoplay: inner.autoplay.enabled,
            auto_paused: self.is_auto_paused(),
            filters: inner.filters.clone(),
            effect_presets: inner.effects.clone(),
            queue: inner.queue.snapshot(),
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        cancel_timer(&mut inner.empty_timer);
        cancel_timer(&mut inner.inactivity_timer);
        inner.discard_prefetch();
        inner.destroy_current();
    }
}
