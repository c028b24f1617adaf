//! Pipeline process tests
//! Runs the pipeline against small shell scripts standing in for the
//! extractor and the transcoder.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use streamify_core::{FilterConfig, Track, TrackSource};
use streamify_pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineState, ShutdownReason, TrackPipeline,
};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

// ===== Helpers =====

/// Write an executable script into `dir`
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(extractor: PathBuf, transcoder: PathBuf) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.extractor.path = extractor;
    config.transcoder.path = transcoder;
    config
}

fn track() -> Track {
    Track::new("abc123", "Test Song", TrackSource::Youtube).with_duration(Duration::from_secs(180))
}

fn pipeline(config: PipelineConfig, track: Track) -> Pipeline {
    Pipeline::new(track, FilterConfig::default(), Arc::new(config), None)
}

const PASSTHROUGH: &str = "exec cat";

// ===== Readiness =====

#[tokio::test]
async fn test_stream_carries_extractor_output() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "printf 'encoded-audio'");
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let stream = pipeline.create(0).await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Ready);

    let mut reader = stream.take_reader().unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"encoded-audio");

    let metrics = pipeline.metrics();
    assert_eq!(metrics.bytes_received, 13);
    assert_eq!(metrics.bytes_sent, 13);
    assert_eq!(pipeline.shutdown_reason(), Some(ShutdownReason::Completed));
}

#[tokio::test]
async fn test_create_on_ready_pipeline_returns_same_stream() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "printf 'data'; exec sleep 5");
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let first = pipeline.create(0).await.unwrap();
    let second = pipeline.create(0).await.unwrap();
    assert_eq!(first.id(), second.id());

    pipeline.destroy();
}

#[tokio::test]
async fn test_readiness_timeout_proceeds() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "exec sleep 5");
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut config = config(extractor, transcoder);
    config.readiness.normal_timeout_ms = 200;

    let mut pipeline = pipeline(config, track());
    let stream = pipeline.create(0).await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Ready);
    assert!(stream.take_reader().is_some());
    assert_eq!(pipeline.metrics().first_byte_ms, 0);

    pipeline.destroy();
}

// ===== Failures =====

#[tokio::test]
async fn test_extractor_failure_is_extraction_error() {
    let dir = TempDir::new().unwrap();
    let extractor = script(
        dir.path(),
        "extractor",
        "echo 'ERROR: [youtube] abc123: Video unavailable' >&2; exit 1",
    );
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let err = pipeline.create(0).await.unwrap_err();

    assert!(matches!(err, PipelineError::Extraction(_)), "got {err:?}");
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(matches!(
        pipeline.shutdown_reason(),
        Some(ShutdownReason::Faulted(_) | ShutdownReason::Completed)
    ));
}

#[tokio::test]
async fn test_transcoder_exit_after_input_is_transcode_error() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "printf 'data'; exec sleep 5");
    let transcoder = script(
        dir.path(),
        "transcoder",
        "head -c 1 > /dev/null; echo 'Error opening output' >&2; exit 3",
    );

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let err = pipeline.create(0).await.unwrap_err();

    assert!(matches!(err, PipelineError::Transcode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_transcoder_exit_before_input_is_transcode_error() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "sleep 1; printf 'data'");
    let transcoder = script(
        dir.path(),
        "transcoder",
        "echo 'Invalid filter graph' >&2; exit 1",
    );

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let err = pipeline.create(0).await.unwrap_err();

    match err {
        PipelineError::Transcode(message) => {
            assert!(message.starts_with("transcoder closed"), "got {message}");
        }
        other => panic!("expected a transcode error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_transcoder_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "printf 'data'");

    let mut pipeline = pipeline(
        config(extractor, dir.path().join("does-not-exist")),
        track(),
    );
    let err = pipeline.create(0).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Spawn {
            tool: "transcoder",
            ..
        }
    ));
}

#[tokio::test]
async fn test_invalid_track_id() {
    let dir = TempDir::new().unwrap();
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let track = Track::new("undefined", "Broken", TrackSource::Youtube);
    let mut pipeline = pipeline(config(dir.path().join("unused"), transcoder), track);

    let err = pipeline.create(0).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTrack(_)));
}

// ===== Teardown =====

#[tokio::test]
async fn test_destroy_is_idempotent_and_final() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "printf 'data'; exec sleep 5");
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    pipeline.create(0).await.unwrap();

    pipeline.destroy();
    pipeline.destroy();

    assert!(pipeline.is_destroyed());
    assert_eq!(pipeline.shutdown_reason(), Some(ShutdownReason::Requested));
    assert!(matches!(
        pipeline.create(0).await,
        Err(PipelineError::Destroyed)
    ));
}

#[tokio::test]
async fn test_cancel_during_create_fails_with_destroyed() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "exec sleep 5");
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let handle = pipeline.cancel_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let started = std::time::Instant::now();
    let err = pipeline.create(0).await.unwrap_err();

    assert!(err.is_destroyed());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(pipeline.state(), PipelineState::Destroyed);
}

#[tokio::test]
async fn test_reader_ends_after_destroy() {
    let dir = TempDir::new().unwrap();
    let extractor = script(dir.path(), "extractor", "printf 'data'; exec sleep 5");
    let transcoder = script(dir.path(), "transcoder", PASSTHROUGH);

    let mut pipeline = pipeline(config(extractor, transcoder), track());
    let stream = pipeline.create(0).await.unwrap();
    let mut reader = stream.take_reader().unwrap();

    pipeline.destroy();

    let mut out = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), reader.read_to_end(&mut out)).await;
    assert!(read.is_ok(), "reader should reach end of stream");
    assert!(out.starts_with(b"data"));
}

// ===== Local files =====

#[tokio::test]
async fn test_local_file_skips_extractor() {
    let dir = TempDir::new().unwrap();
    let audio = dir.path().join("song.ogg");
    std::fs::write(&audio, b"local-audio").unwrap();

    // Prints the file named after -i
    let transcoder = script(
        dir.path(),
        "transcoder",
        r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-i" ]; then exec cat "$2"; fi
  shift
done
exit 1"#,
    );

    let track = Track::new("song", "Local Song", TrackSource::Local)
        .with_duration(Duration::from_secs(60))
        .with_local_path(&audio);
    let mut pipeline = pipeline(config(dir.path().join("no-extractor"), transcoder), track);

    let stream = pipeline.create(0).await.unwrap();
    let mut out = Vec::new();
    stream
        .take_reader()
        .unwrap()
        .read_to_end(&mut out)
        .await
        .unwrap();

    assert_eq!(out, b"local-audio");
    assert_eq!(pipeline.metrics().bytes_received, 0);
}
