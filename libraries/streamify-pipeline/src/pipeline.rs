//! Extractor and transcoder process pair
//!
//! A [`Pipeline`] owns the two child processes that turn a [`Track`] into an
//! encoded audio stream. The extractor fetches the source and writes it to
//! stdout, a pump task copies that into the transcoder's stdin, and the
//! transcoder applies the filter chain and writes encoded audio to stdout.
//!
//! Local files skip the extractor and are handed to the transcoder directly.
//!
//! `create` returns once the transcoder has produced its first bytes, or once
//! the readiness timeout has elapsed. `destroy` is synchronous and may be
//! called at any time, including while `create` is still waiting; the
//! in-flight `create` then fails with [`PipelineError::Destroyed`].

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::extractor::extractor_args;
use crate::metrics::{Counters, PipelineMetrics};
use crate::stream::{AudioStream, CountingReader, Direction};
use async_trait::async_trait;
use std::io::{self, Cursor};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use streamify_core::{FilterConfig, Track, TrackResolver};
use streamify_filters::{build_transcoder_args, TranscoderInput};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const FIRST_READ_SIZE: usize = 16 * 1024;
const STDERR_TAIL_BYTES: usize = 512;

/// Lifecycle of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Built but not started, or a previous `create` failed
    Idle,
    /// `create` is in flight
    Starting,
    /// Processes are running and the stream is exposed
    Ready,
    /// Torn down; every further `create` fails
    Destroyed,
}

/// Why the extractor-to-transcoder pump stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The source was drained and the transcoder input half-closed
    Completed,
    /// Teardown was requested
    Requested,
    /// A process or pipe failed
    Faulted(String),
}

/// Cancels a pipeline from outside the task that owns it
///
/// Cancelling is equivalent to `destroy` for every in-flight and future
/// `create` call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the handle has been cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// A per-track stream producer
#[async_trait]
pub trait TrackPipeline: Send {
    /// Start producing audio, optionally from `seek_ms`
    ///
    /// Calling `create` on a ready pipeline returns the same stream handle.
    async fn create(&mut self, seek_ms: u64) -> Result<AudioStream>;

    /// Tear down all processes; idempotent
    fn destroy(&mut self);

    fn cancel_handle(&self) -> CancelHandle;

    fn state(&self) -> PipelineState;

    fn track(&self) -> &Track;

    fn metrics(&self) -> PipelineMetrics;

    fn is_destroyed(&self) -> bool {
        self.state() == PipelineState::Destroyed
    }
}

/// The process-backed pipeline
pub struct Pipeline {
    id: Uuid,
    track: Track,
    filters: FilterConfig,
    config: Arc<PipelineConfig>,
    resolver: Option<Arc<dyn TrackResolver>>,
    state: PipelineState,
    cancel: CancelHandle,
    processes: Option<Processes>,
    stream: Option<AudioStream>,
    counters: Arc<Counters>,
    timings: PipelineMetrics,
    shutdown: ShutdownSlot,
    started_at: Option<Instant>,
}

impl Pipeline {
    pub fn new(
        track: Track,
        filters: FilterConfig,
        config: Arc<PipelineConfig>,
        resolver: Option<Arc<dyn TrackResolver>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            track,
            filters,
            config,
            resolver,
            state: PipelineState::Idle,
            cancel: CancelHandle::new(),
            processes: None,
            stream: None,
            counters: Arc::new(Counters::default()),
            timings: PipelineMetrics::default(),
            shutdown: ShutdownSlot::default(),
            started_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// Why the most recent attempt stopped feeding the transcoder, if it has
    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.shutdown.get()
    }

    async fn start(&mut self, seek_ms: u64, started: Instant) -> Result<AudioStream> {
        let id = resolve_playable_id(&self.track, self.resolver.as_ref(), &self.cancel).await?;
        self.timings.metadata_ms = elapsed_ms(started);

        let spawn_started = Instant::now();
        self.counters = Arc::new(Counters::default());
        self.shutdown = ShutdownSlot::default();
        let Spawned {
            mut processes,
            mut stdout,
            extractor_stderr,
            transcoder_stderr,
        } = self.spawn(&id, seek_ms)?;
        self.timings.spawn_ms = elapsed_ms(spawn_started);

        info!(
            pipeline = %self.id,
            track = %self.track.title,
            source = %self.track.source,
            seek_ms,
            "Pipeline spawned"
        );

        let timeout = self.config.readiness_timeout(&self.track);
        let readiness = wait_for_data(
            &mut stdout,
            &mut processes.extractor,
            &self.cancel.token,
            timeout,
            &extractor_stderr,
        )
        .await?;

        let first_chunk = match readiness {
            Readiness::Data(chunk) => {
                self.timings.first_byte_ms = elapsed_ms(spawn_started);
                chunk
            }
            Readiness::TimedOut => {
                warn!(
                    pipeline = %self.id,
                    received = self.counters.received(),
                    live = self.track.is_indeterminate(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for data, proceeding anyway"
                );
                Vec::new()
            }
            Readiness::Closed => {
                // Blame the extractor only if it already exited without output
                let extractor_exited = match processes.extractor.as_mut() {
                    Some(extractor) => matches!(extractor.try_wait(), Ok(Some(_))),
                    None => false,
                };
                let err = if extractor_exited && self.counters.received() == 0 {
                    PipelineError::Extraction(with_tail(
                        "extractor produced no data",
                        &extractor_stderr,
                    ))
                } else {
                    PipelineError::Transcode(with_tail(
                        "transcoder closed before producing data",
                        &transcoder_stderr,
                    ))
                };
                return Err(err);
            }
        };

        // A destroy that raced the last await wins over readiness
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Destroyed);
        }

        let reader = CountingReader::new(
            Cursor::new(first_chunk).chain(stdout),
            self.counters.clone(),
            Direction::Sent,
        );
        let stream = AudioStream::new(reader);

        self.timings.total_ms = elapsed_ms(started);
        self.processes = Some(processes);
        self.stream = Some(stream.clone());
        self.state = PipelineState::Ready;

        info!(
            pipeline = %self.id,
            track = %self.track.title,
            metadata_ms = self.timings.metadata_ms,
            spawn_ms = self.timings.spawn_ms,
            first_byte_ms = self.timings.first_byte_ms,
            total_ms = self.timings.total_ms,
            "Stream ready"
        );

        Ok(stream)
    }

    fn spawn(&self, id: &str, seek_ms: u64) -> Result<Spawned> {
        let local = self.track.is_local();
        let input = if local {
            TranscoderInput::File {
                path: self.local_input(id),
                seek_ms,
            }
        } else {
            TranscoderInput::Pipe
        };

        let transcoder_args = build_transcoder_args(&self.filters, &self.config.audio, &input);
        debug!(pipeline = %self.id, args = ?transcoder_args, "Transcoder arguments");

        let mut transcoder = Command::new(&self.config.transcoder.path)
            .args(&transcoder_args)
            .stdin(if local { Stdio::null() } else { Stdio::piped() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                tool: "transcoder",
                source,
            })?;

        let transcoder_stderr = StderrTail::default();
        if let Some(stderr) = transcoder.stderr.take() {
            spawn_stderr_reader(Tool::Transcoder, stderr, self.id, transcoder_stderr.clone());
        }

        let mut processes = Processes {
            extractor: None,
            transcoder,
        };

        let stdout = processes
            .transcoder
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Transcode("transcoder stdout unavailable".into()))?;

        let extractor_stderr = StderrTail::default();
        if !local {
            let args = extractor_args(&self.track, id, seek_ms, &self.config.extractor);
            debug!(pipeline = %self.id, args = ?args, "Extractor arguments");

            let mut extractor = Command::new(&self.config.extractor.path)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| PipelineError::Spawn {
                    tool: "extractor",
                    source,
                })?;

            if let Some(stderr) = extractor.stderr.take() {
                spawn_stderr_reader(Tool::Extractor, stderr, self.id, extractor_stderr.clone());
            }

            let source = extractor.stdout.take();
            processes.extractor = Some(extractor);

            let source = source
                .ok_or_else(|| PipelineError::Extraction("extractor stdout unavailable".into()))?;
            let sink = processes
                .transcoder
                .stdin
                .take()
                .ok_or_else(|| PipelineError::Transcode("transcoder stdin unavailable".into()))?;

            tokio::spawn(pump(
                CountingReader::new(source, self.counters.clone(), Direction::Received),
                sink,
                self.cancel.token.clone(),
                self.id,
                self.shutdown.clone(),
            ));
        }

        Ok(Spawned {
            processes,
            stdout,
            extractor_stderr,
            transcoder_stderr,
        })
    }

    fn local_input(&self, id: &str) -> PathBuf {
        self.track
            .local_path
            .clone()
            .or_else(|| self.track.uri.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(id))
    }
}

#[async_trait]
impl TrackPipeline for Pipeline {
    async fn create(&mut self, seek_ms: u64) -> Result<AudioStream> {
        match self.state() {
            PipelineState::Destroyed => return Err(PipelineError::Destroyed),
            PipelineState::Ready => {
                if let Some(stream) = &self.stream {
                    return Ok(stream.clone());
                }
            }
            PipelineState::Idle | PipelineState::Starting => {}
        }

        self.state = PipelineState::Starting;
        let started = Instant::now();
        self.started_at = Some(started);

        match self.start(seek_ms, started).await {
            Ok(stream) => Ok(stream),
            Err(err) if err.is_destroyed() || self.cancel.is_cancelled() => {
                debug!(pipeline = %self.id, "Stream destroyed during create");
                self.destroy();
                Err(PipelineError::Destroyed)
            }
            Err(err) => {
                warn!(
                    pipeline = %self.id,
                    track = %self.track.title,
                    "Failed to create stream: {}",
                    err
                );
                self.shutdown.set(ShutdownReason::Faulted(err.to_string()));
                self.state = PipelineState::Idle;
                Err(err)
            }
        }
    }

    fn destroy(&mut self) {
        if self.state == PipelineState::Destroyed {
            return;
        }
        self.state = PipelineState::Destroyed;
        self.cancel.cancel();
        self.shutdown.set(ShutdownReason::Requested);

        if let Some(mut processes) = self.processes.take() {
            processes.kill();
        }
        self.stream = None;

        if let Some(started) = self.started_at {
            let mb_out = self.counters.sent() as f64 / 1_048_576.0;
            info!(
                pipeline = %self.id,
                track = %self.track.title,
                elapsed_ms = elapsed_ms(started),
                mb_out = %format!("{mb_out:.2}"),
                "Destroying stream"
            );
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
        PipelineMetrics {
            bytes_received: self.counters.received(),
            bytes_sent: self.counters.sent(),
            ..self.timings
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ===== Processes =====

struct Processes {
    extractor: Option<Child>,
    transcoder: Child,
}

impl Processes {
    fn kill(&mut self) {
        if let Some(extractor) = self.extractor.as_mut() {
            if let Err(e) = extractor.start_kill() {
                debug!("Extractor already gone: {}", e);
            }
        }
        if let Err(e) = self.transcoder.start_kill() {
            debug!("Transcoder already gone: {}", e);
        }
    }
}

impl Drop for Processes {
    fn drop(&mut self) {
        self.kill();
    }
}

struct Spawned {
    processes: Processes,
    stdout: ChildStdout,
    extractor_stderr: StderrTail,
    transcoder_stderr: StderrTail,
}

async fn resolve_playable_id(
    track: &Track,
    resolver: Option<&Arc<dyn TrackResolver>>,
    cancel: &CancelHandle,
) -> Result<String> {
    if track.needs_resolution() {
        let resolver = resolver.ok_or_else(|| {
            PipelineError::Resolution(format!(
                "no resolver for {} track {}",
                track.source, track.id
            ))
        })?;

        let resolved = tokio::select! {
            () = cancel.cancelled() => return Err(PipelineError::Destroyed),
            resolved = resolver.resolve(track) => {
                resolved.map_err(|e| PipelineError::Resolution(e.to_string()))?
            }
        };
        debug!(track = %track.title, resolved = %resolved, "Resolved track");
        track.set_resolved_id(resolved);
    }

    track.playable_id().map(str::to_string).ok_or_else(|| {
        PipelineError::InvalidTrack(format!(
            "{:?} (source: {}, title: {})",
            track.id, track.source, track.title
        ))
    })
}

// ===== Readiness =====

enum Readiness {
    Data(Vec<u8>),
    TimedOut,
    Closed,
}

/// Wait for the first transcoder output, a failure, or the deadline
async fn wait_for_data(
    stdout: &mut ChildStdout,
    extractor: &mut Option<Child>,
    cancel: &CancellationToken,
    timeout: Duration,
    extractor_stderr: &StderrTail,
) -> Result<Readiness> {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut buf = vec![0u8; FIRST_READ_SIZE];
    let mut extractor_running = extractor.is_some();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(PipelineError::Destroyed),

            read = stdout.read(&mut buf) => {
                return match read {
                    Ok(0) => Ok(Readiness::Closed),
                    Ok(n) => {
                        buf.truncate(n);
                        Ok(Readiness::Data(buf))
                    }
                    Err(e) => Err(PipelineError::Transcode(e.to_string())),
                };
            }

            status = wait_child(extractor), if extractor_running => {
                extractor_running = false;
                match status {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        return Err(PipelineError::Extraction(with_tail(
                            &exit_description(status),
                            extractor_stderr,
                        )));
                    }
                    Err(e) => return Err(PipelineError::Extraction(e.to_string())),
                }
            }

            () = &mut deadline => return Ok(Readiness::TimedOut),
        }
    }
}

async fn wait_child(child: &mut Option<Child>) -> io::Result<ExitStatus> {
    match child {
        Some(child) => child.wait().await,
        None => std::future::pending().await,
    }
}

fn exit_description(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("extractor exited with code {code}"),
        None => "extractor terminated by signal".to_string(),
    }
}

fn with_tail(message: &str, tail: &StderrTail) -> String {
    let tail = tail.snapshot();
    if tail.is_empty() {
        message.to_string()
    } else {
        format!("{message}: {tail}")
    }
}

// ===== Pump =====

/// Copy extractor output into the transcoder
///
/// On a clean end of input the transcoder's stdin is shut down so it can
/// flush its encoder and exit on its own.
async fn pump(
    mut source: CountingReader<ChildStdout>,
    mut sink: ChildStdin,
    cancel: CancellationToken,
    pipeline: Uuid,
    shutdown: ShutdownSlot,
) {
    let reason = tokio::select! {
        () = cancel.cancelled() => ShutdownReason::Requested,
        copied = tokio::io::copy(&mut source, &mut sink) => match copied {
            Ok(bytes) => {
                if let Err(e) = sink.shutdown().await {
                    debug!(pipeline = %pipeline, "Transcoder stdin already closed: {}", e);
                }
                debug!(pipeline = %pipeline, bytes, "Extractor output drained");
                ShutdownReason::Completed
            }
            Err(e) if is_pipe_closed(&e) => {
                debug!(pipeline = %pipeline, "Pipe closed: {}", e);
                ShutdownReason::Faulted(e.to_string())
            }
            Err(e) => {
                warn!(pipeline = %pipeline, "Pump failed: {}", e);
                ShutdownReason::Faulted(e.to_string())
            }
        },
    };
    shutdown.set(reason);
    // Closing stdin is what the transcoder sees as end of input
    drop(sink);
}

fn is_pipe_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

#[derive(Debug, Clone, Default)]
struct ShutdownSlot(Arc<Mutex<Option<ShutdownReason>>>);

impl ShutdownSlot {
    /// Record `reason` unless one was recorded already
    fn set(&self, reason: ShutdownReason) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
        }
    }

    fn get(&self) -> Option<ShutdownReason> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

// ===== Stderr =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Extractor,
    Transcoder,
}

impl Tool {
    fn name(self) -> &'static str {
        match self {
            Tool::Extractor => "extractor",
            Tool::Transcoder => "transcoder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StderrLevel {
    Error,
    Debug,
    Ignore,
}

/// Broken pipes and resets are the normal result of tearing a stream down
fn is_teardown_noise(line: &str) -> bool {
    line.contains("Broken pipe") || line.contains("Connection reset")
}

fn stderr_level(tool: Tool, line: &str) -> StderrLevel {
    if is_teardown_noise(line) {
        return StderrLevel::Debug;
    }
    match tool {
        Tool::Extractor if line.contains("ERROR") => StderrLevel::Error,
        Tool::Extractor if line.starts_with("[download]") => StderrLevel::Ignore,
        Tool::Transcoder if line.contains("Error") || line.contains("error") => {
            StderrLevel::Error
        }
        Tool::Extractor | Tool::Transcoder => StderrLevel::Debug,
    }
}

fn spawn_stderr_reader<R>(tool: Tool, stderr: R, pipeline: Uuid, tail: StderrTail)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tail.push(line);
            match stderr_level(tool, line) {
                StderrLevel::Error => error!(pipeline = %pipeline, tool = tool.name(), "{}", line),
                StderrLevel::Debug => debug!(pipeline = %pipeline, tool = tool.name(), "{}", line),
                StderrLevel::Ignore => {}
            }
        }
    });
}

/// The last few hundred bytes a process wrote to stderr
#[derive(Debug, Clone, Default)]
struct StderrTail(Arc<Mutex<String>>);

impl StderrTail {
    fn push(&self, line: &str) {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(line);

        if buf.len() > STDERR_TAIL_BYTES {
            let mut cut = buf.len() - STDERR_TAIL_BYTES;
            while !buf.is_char_boundary(cut) {
                cut += 1;
            }
            buf.drain(..cut);
        }
    }

    fn snapshot(&self) -> String {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .trim()
            .to_string()
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractor_errors_are_surfaced() {
        assert_eq!(
            stderr_level(Tool::Extractor, "ERROR: [youtube] abc: Video unavailable"),
            StderrLevel::Error
        );
        assert_eq!(
            stderr_level(Tool::Extractor, "[download]  12.5% of 3.4MiB"),
            StderrLevel::Ignore
        );
        assert_eq!(
            stderr_level(Tool::Extractor, "[youtube] abc: Downloading webpage"),
            StderrLevel::Debug
        );
    }

    #[test]
    fn teardown_noise_is_demoted() {
        assert_eq!(
            stderr_level(Tool::Transcoder, "av_interleaved_write_frame(): Broken pipe error"),
            StderrLevel::Debug
        );
        assert_eq!(
            stderr_level(Tool::Extractor, "ERROR: Connection reset by peer"),
            StderrLevel::Debug
        );
        assert_eq!(
            stderr_level(Tool::Transcoder, "Error while decoding stream #0:0"),
            StderrLevel::Error
        );
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let tail = StderrTail::default();
        for i in 0..200 {
            tail.push(&format!("line {i}"));
        }
        let snapshot = tail.snapshot();
        assert!(snapshot.len() <= STDERR_TAIL_BYTES);
        assert!(snapshot.ends_with("line 199"));
    }

    #[test]
    fn first_shutdown_reason_wins() {
        let slot = ShutdownSlot::default();
        slot.set(ShutdownReason::Completed);
        slot.set(ShutdownReason::Requested);
        assert_eq!(slot.get(), Some(ShutdownReason::Completed));
    }

    #[test]
    fn cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn unresolvable_track_is_invalid() {
        let track = Track::new("undefined", "Ghost", streamify_core::TrackSource::Youtube);
        let err = resolve_playable_id(&track, None, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTrack(_)));
    }

    #[tokio::test]
    async fn spotify_without_resolver_fails_resolution() {
        let track = Track::new("sp1", "Song", streamify_core::TrackSource::Spotify);
        let err = resolve_playable_id(&track, None, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Resolution(_)));
    }
}
