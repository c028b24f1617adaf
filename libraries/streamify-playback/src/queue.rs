//! Playback queue with bounded history
//!
//! ```text
//! history (most recent first)   current   pending (play order)
//! [ C, B, A ]              <-   [ D ]  <- [ E, F, G ]
//! ```
//!
//! `shift` moves forward: the current track goes to the front of history and
//! the front of pending becomes current. `unshift` moves back the other way.

use crate::types::RepeatMode;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use streamify_core::Track;

/// Default number of tracks kept for `previous`
pub const DEFAULT_MAX_HISTORY: usize = 25;

#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    current: Option<Track>,
    pending: VecDeque<Track>,
    /// Most recent first
    history: VecDeque<Track>,
    max_history: usize,
    repeat_mode: RepeatMode,
}

/// Serialisable view of a queue
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub tracks: Vec<Track>,
    pub previous: Vec<Track>,
    pub repeat_mode: RepeatMode,
    pub size: usize,
    pub total_duration_ms: u64,
}

impl PlaybackQueue {
    pub fn new(max_history: usize) -> Self {
        Self {
            current: None,
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(max_history),
            max_history,
            repeat_mode: RepeatMode::Off,
        }
    }

    /// Insert `track` at `position` if it is inside the queue, else append
    ///
    /// Returns the new number of pending tracks.
    pub fn add(&mut self, track: Track, position: Option<usize>) -> usize {
        match position {
            Some(index) if index < self.pending.len() => self.pending.insert(index, track),
            _ => self.pending.push_back(track),
        }
        self.pending.len()
    }

    /// Insert `tracks` in order at `position` if it is inside the queue, else
    /// append them
    pub fn add_many(&mut self, tracks: impl IntoIterator<Item = Track>, position: Option<usize>) -> usize {
        match position {
            Some(index) if index < self.pending.len() => {
                for (offset, track) in tracks.into_iter().enumerate() {
                    self.pending.insert(index + offset, track);
                }
            }
            _ => self.pending.extend(tracks),
        }
        self.pending.len()
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.pending.remove(index)
    }

    /// Drop all pending tracks, returning how many there were
    ///
    /// The current track and history are left alone.
    pub fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        cleared
    }

    /// Uniformly shuffle the pending tracks
    pub fn shuffle(&mut self) -> usize {
        self.shuffle_with(&mut rand::thread_rng())
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.pending.make_contiguous().shuffle(rng);
        self.pending.len()
    }

    /// Move the pending track at `from` to `to`
    ///
    /// Returns `false` without changing anything if either index is out of
    /// range.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        let len = self.pending.len();
        if from >= len || to >= len {
            return false;
        }
        if let Some(track) = self.pending.remove(from) {
            self.pending.insert(to, track);
        }
        true
    }

    /// Advance to the next track
    pub fn shift(&mut self) -> Option<Track> {
        if let Some(current) = &self.current {
            self.history.push_front(current.clone());
            self.history.truncate(self.max_history);
        }

        if self.repeat_mode == RepeatMode::Track && self.current.is_some() {
            return self.current.clone();
        }

        if self.repeat_mode == RepeatMode::Queue
            && self.pending.is_empty()
            && !self.history.is_empty()
        {
            self.pending = self.history.drain(..).rev().collect();
        }

        self.current = self.pending.pop_front();
        self.current.clone()
    }

    /// Step back to the most recent history entry
    ///
    /// The current track goes back to the front of pending.
    pub fn unshift(&mut self) -> Option<Track> {
        let previous = self.history.pop_front()?;
        if let Some(current) = self.current.take() {
            self.pending.push_front(current);
        }
        self.current = Some(previous);
        self.current.clone()
    }

    pub fn set_current(&mut self, track: Option<Track>) {
        self.current = track;
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn peek_next(&self) -> Option<&Track> {
        self.pending.front()
    }

    pub fn pending(&self) -> &VecDeque<Track> {
        &self.pending
    }

    /// History, most recent first
    pub fn history(&self) -> &VecDeque<Track> {
        &self.history
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Number of pending tracks
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Duration of the current track plus everything pending
    ///
    /// Live tracks count as zero.
    pub fn total_duration(&self) -> Duration {
        self.current
            .iter()
            .chain(self.pending.iter())
            .filter_map(|t| t.duration)
            .sum()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            tracks: self.pending.iter().cloned().collect(),
            previous: self.history.iter().cloned().collect(),
            repeat_mode: self.repeat_mode,
            size: self.pending.len(),
            total_duration_ms: self.total_duration().as_millis() as u64,
        }
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use streamify_core::TrackSource;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Song {id}"), TrackSource::Youtube)
            .with_duration(Duration::from_secs(180))
    }

    fn ids(tracks: &VecDeque<Track>) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    fn queue_of(pending: &[&str]) -> PlaybackQueue {
        let mut queue = PlaybackQueue::default();
        queue.add_many(pending.iter().map(|id| track(id)), None);
        queue
    }

    #[test]
    fn add_inserts_in_range_and_appends_otherwise() {
        let mut queue = queue_of(&["a", "b"]);
        queue.add(track("c"), Some(1));
        queue.add(track("d"), Some(10));
        queue.add(track("e"), None);
        assert_eq!(ids(queue.pending()), ["a", "c", "b", "d", "e"]);
    }

    #[test]
    fn add_many_keeps_order_at_position() {
        let mut queue = queue_of(&["a", "b"]);
        queue.add_many(vec![track("x"), track("y")], Some(0));
        assert_eq!(ids(queue.pending()), ["x", "y", "a", "b"]);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut queue = queue_of(&["a"]);
        assert!(queue.remove(3).is_none());
        assert_eq!(queue.remove(0).unwrap().id, "a");
    }

    #[test]
    fn move_track_checks_both_indices() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert!(!queue.move_track(0, 3));
        assert!(!queue.move_track(5, 0));
        assert!(queue.move_track(0, 2));
        assert_eq!(ids(queue.pending()), ["b", "c", "a"]);
    }

    #[test]
    fn shift_moves_current_into_history() {
        let mut queue = queue_of(&["a", "b"]);
        assert_eq!(queue.shift().unwrap().id, "a");
        assert_eq!(queue.shift().unwrap().id, "b");
        assert!(queue.shift().is_none());
        assert_eq!(ids(queue.history()), ["b", "a"]);
        assert!(queue.current().is_none());
    }

    #[test]
    fn repeat_track_returns_current() {
        let mut queue = queue_of(&["b"]);
        queue.set_current(Some(track("a")));
        queue.set_repeat_mode(RepeatMode::Track);

        assert_eq!(queue.shift().unwrap().id, "a");
        assert_eq!(queue.current().unwrap().id, "a");
        assert_eq!(ids(queue.pending()), ["b"]);
    }

    #[test]
    fn repeat_queue_refills_from_history() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.set_repeat_mode(RepeatMode::Queue);
        queue.shift();
        queue.shift();
        queue.shift();

        // c is current; the next shift wraps around
        assert_eq!(queue.shift().unwrap().id, "a");
        assert_eq!(ids(queue.pending()), ["b", "c"]);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn unshift_steps_back() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.shift();
        queue.shift();

        assert_eq!(queue.unshift().unwrap().id, "a");
        assert_eq!(queue.current().unwrap().id, "a");
        assert_eq!(ids(queue.pending()), ["b", "c"]);
    }

    #[test]
    fn unshift_with_empty_history_is_none() {
        let mut queue = queue_of(&["a"]);
        queue.set_current(Some(track("x")));
        assert!(queue.unshift().is_none());
        assert_eq!(queue.current().unwrap().id, "x");
    }

    #[test]
    fn history_is_bounded() {
        let mut queue = PlaybackQueue::new(3);
        queue.add_many((0..10).map(|i| track(&i.to_string())), None);
        for _ in 0..11 {
            queue.shift();
        }
        assert_eq!(ids(queue.history()), ["9", "8", "7"]);
    }

    #[test]
    fn total_duration_counts_current_and_pending() {
        let mut queue = queue_of(&["a", "b"]);
        queue.set_current(Some(track("c")));
        queue.add(Track::new("live", "Radio", TrackSource::Twitch).live(), None);
        assert_eq!(queue.total_duration(), Duration::from_secs(540));
    }

    #[test]
    fn shuffle_keeps_every_track() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);
        queue.shuffle_with(&mut StdRng::seed_from_u64(7));

        let mut shuffled = ids(queue.pending());
        shuffled.sort_unstable();
        assert_eq!(shuffled, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn clear_leaves_current_and_history() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.shift();
        queue.shift();
        assert_eq!(queue.clear(), 1);
        assert_eq!(queue.current().unwrap().id, "b");
        assert_eq!(queue.history().len(), 1);
    }

    #[test]
    fn snapshot_serialises() {
        let mut queue = queue_of(&["a"]);
        queue.shift();
        let json = serde_json::to_value(queue.snapshot()).unwrap();
        assert_eq!(json["current"]["id"], "a");
        assert_eq!(json["repeatMode"], "off");
        assert_eq!(json["size"], 0);
    }
}
