//! Counting guards for operations that must mute natural-end handling

use std::sync::atomic::{AtomicUsize, Ordering};

/// Holds a counter raised for as long as the guard lives
///
/// Counters rather than booleans, so overlapping operations cannot clear
/// each other's flag.
pub(crate) struct FlagGuard<'a>(&'a AtomicUsize);

impl<'a> FlagGuard<'a> {
    pub(crate) fn hold(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn is_held(counter: &AtomicUsize) -> bool {
    counter.load(Ordering::SeqCst) > 0
}
