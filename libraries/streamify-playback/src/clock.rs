//! Playback position clock

use tokio::time::Instant;

/// Frozen offset plus the time elapsed since the clock last started
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PositionClock {
    offset_ms: u64,
    started_at: Option<Instant>,
}

impl PositionClock {
    /// Run from `offset_ms`
    pub(crate) fn start(&mut self, offset_ms: u64) {
        self.offset_ms = offset_ms;
        self.started_at = Some(Instant::now());
    }

    /// Stop at `offset_ms`
    pub(crate) fn freeze(&mut self, offset_ms: u64) {
        self.offset_ms = offset_ms;
        self.started_at = None;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn position(&self) -> u64 {
        let running = self
            .started_at
            .map_or(0, |at| at.elapsed().as_millis() as u64);
        self.offset_ms + running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn running_clock_advances() {
        let mut clock = PositionClock::default();
        clock.start(10_000);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.position(), 15_000);

        clock.freeze(clock.position());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.position(), 15_000);

        clock.reset();
        assert_eq!(clock.position(), 0);
    }
}
