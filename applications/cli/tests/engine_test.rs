//! Sink engine tests: copying streams out and reporting their end

use std::time::Duration;
use streamify_cli::SinkEngine;
use streamify_pipeline::AudioStream;
use streamify_playback::{EngineSignal, PlaybackEngine};
use tempfile::TempDir;
use tokio::sync::mpsc;

async fn file_engine(dir: &TempDir) -> (SinkEngine, mpsc::UnboundedReceiver<EngineSignal>) {
    let file = tokio::fs::File::create(dir.path().join("out.opus"))
        .await
        .unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    (SinkEngine::new(file, tx), rx)
}

fn sink_engine() -> (SinkEngine, mpsc::UnboundedReceiver<EngineSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SinkEngine::new(tokio::io::sink(), tx), rx)
}

// ===== Copying =====

#[tokio::test]
async fn test_stream_is_written_and_reported_idle() {
    let dir = TempDir::new().unwrap();
    let (engine, mut signals) = file_engine(&dir).await;

    let stream = AudioStream::new(&b"OggS audio bytes"[..]);
    let id = stream.id();
    engine.play(stream);

    assert_eq!(signals.recv().await, Some(EngineSignal::Idle(id)));
    let written = std::fs::read(dir.path().join("out.opus")).unwrap();
    assert_eq!(written, b"OggS audio bytes");
}

#[tokio::test]
async fn test_taken_stream_is_an_error() {
    let dir = TempDir::new().unwrap();
    let (engine, mut signals) = file_engine(&dir).await;

    let stream = AudioStream::new(&b"data"[..]);
    let _reader = stream.take_reader();
    engine.play(stream.clone());

    assert!(matches!(
        signals.recv().await,
        Some(EngineSignal::Error(id, _)) if id == stream.id()
    ));
}

// ===== Control =====

#[tokio::test(start_paused = true)]
async fn test_pause_holds_the_stream() {
    let (engine, mut signals) = sink_engine();

    let stream = AudioStream::new(&b"data"[..]);
    let id = stream.id();
    engine.play(stream);
    engine.pause();

    let held = tokio::time::timeout(Duration::from_secs(1), signals.recv()).await;
    assert!(held.is_err(), "paused stream must not drain");

    engine.unpause();
    assert_eq!(signals.recv().await, Some(EngineSignal::Idle(id)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_silent() {
    let (engine, mut signals) = sink_engine();

    let (_writer, reader) = tokio::io::duplex(64);
    engine.play(AudioStream::new(reader));
    engine.stop();

    let signal = tokio::time::timeout(Duration::from_secs(1), signals.recv()).await;
    assert!(signal.is_err(), "stopping does not report idle");
}
