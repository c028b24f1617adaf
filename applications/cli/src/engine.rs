//! Engine that writes exposed streams to a byte sink
//!
//! Stands in for a voice transport: the encoded audio is copied to a file or
//! stdout, and the end of each stream is reported back to the player.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use streamify_core::StatusSink;
use streamify_pipeline::{AudioReader, AudioStream, StreamId};
use streamify_playback::{EngineSignal, PlaybackEngine};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHUNK_SIZE: usize = 16 * 1024;

type Output = Box<dyn AsyncWrite + Send + Unpin>;

pub struct SinkEngine {
    output: Arc<tokio::sync::Mutex<Output>>,
    paused: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    signals: mpsc::UnboundedSender<EngineSignal>,
}

impl SinkEngine {
    pub fn new(
        output: impl AsyncWrite + Send + Unpin + 'static,
        signals: mpsc::UnboundedSender<EngineSignal>,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            output: Arc::new(tokio::sync::Mutex::new(Box::new(output))),
            paused,
            task: Mutex::new(None),
            signals,
        }
    }

    fn replace_task(&self, task: Option<JoinHandle<()>>) {
        let mut slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, task) {
            previous.abort();
        }
    }
}

impl PlaybackEngine for SinkEngine {
    fn play(&self, stream: AudioStream) {
        let id = stream.id();
        let Some(reader) = stream.take_reader() else {
            warn!(stream = %id, "Stream reader already taken");
            let _ = self.signals.send(EngineSignal::Error(
                id,
                "stream reader already taken".to_string(),
            ));
            return;
        };

        self.paused.send_replace(false);
        let task = tokio::spawn(pump(
            id,
            reader,
            self.output.clone(),
            self.paused.subscribe(),
            self.signals.clone(),
        ));
        self.replace_task(Some(task));
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn unpause(&self) {
        self.paused.send_replace(false);
    }

    fn stop(&self) {
        self.replace_task(None);
    }
}

impl Drop for SinkEngine {
    fn drop(&mut self) {
        self.replace_task(None);
    }
}

async fn pump(
    id: StreamId,
    mut reader: AudioReader,
    output: Arc<tokio::sync::Mutex<Output>>,
    mut paused: watch::Receiver<bool>,
    signals: mpsc::UnboundedSender<EngineSignal>,
) {
    let signal = match copy(&mut reader, &output, &mut paused).await {
        Ok(bytes) => {
            debug!(stream = %id, bytes, "Stream drained");
            EngineSignal::Idle(id)
        }
        Err(e) => {
            warn!(stream = %id, error = %e, "Stream failed");
            EngineSignal::Error(id, e.to_string())
        }
    };
    let _ = signals.send(signal);
}

async fn copy(
    reader: &mut AudioReader,
    output: &tokio::sync::Mutex<Output>,
    paused: &mut watch::Receiver<bool>,
) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        while *paused.borrow_and_update() {
            if paused.changed().await.is_err() {
                return Ok(total);
            }
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.lock().await.write_all(&buf[..n]).await?;
        total += n as u64;
    }

    output.lock().await.flush().await?;
    Ok(total)
}

/// Status sink that logs the voice status line
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn set_status(&self, session_id: &str, status: Option<&str>) {
        match status {
            Some(status) => info!(session = session_id, status, "Voice status"),
            None => debug!(session = session_id, "Voice status cleared"),
        }
    }
}
