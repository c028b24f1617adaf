//! Pipeline observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Byte counters shared with the pump and the consumer-facing reader
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) received: AtomicU64,
    pub(crate) sent: AtomicU64,
}

impl Counters {
    pub(crate) fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub(crate) fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

/// Timing and throughput of one pipeline, in milliseconds and bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    /// Cross-source resolution before spawn
    pub metadata_ms: u64,
    /// Spawning both processes
    pub spawn_ms: u64,
    /// Spawn complete to first transcoder output
    pub first_byte_ms: u64,
    /// `create` start to readiness
    pub total_ms: u64,
    /// Bytes the extractor handed to the transcoder
    pub bytes_received: u64,
    /// Bytes the consumer has read
    pub bytes_sent: u64,
}
