//! Per-path debouncing logic
//!
//! Coalesces a burst of raw change notifications for one file into a single
//! publish. The publish fires once the file has been quiet for `window`, but
//! never later than `max_delay` after the first change of the burst, so a
//! file that is written continuously still produces periodic updates.

use std::time::Duration;
use tokio::time::Instant;

/// Trailing-edge debounce state for one watched file
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    max_delay: Duration,
    first: Option<Instant>,
    last: Option<Instant>,
    pending: usize,
}

impl Debounce {
    pub fn new(window: Duration, max_delay: Duration) -> Self {
        Self {
            window,
            max_delay: max_delay.max(window),
            first: None,
            last: None,
            pending: 0,
        }
    }

    /// Note one raw change observed at `now`
    pub fn record(&mut self, now: Instant) {
        self.first.get_or_insert(now);
        self.last = Some(now);
        self.pending += 1;
    }

    /// When the pending burst should be published, if there is one
    ///
    /// A bound that overflows the clock is ignored; with neither bound
    /// representable the burst is due immediately.
    pub fn deadline(&self) -> Option<Instant> {
        let (first, last) = (self.first?, self.last?);
        let quiet = last.checked_add(self.window);
        let cap = first.checked_add(self.max_delay);
        Some(quiet.into_iter().chain(cap).min().unwrap_or(last))
    }

    pub fn is_pending(&self) -> bool {
        self.pending > 0
    }

    /// Close the current burst, returning how many raw changes it held
    pub fn take(&mut self) -> usize {
        self.first = None;
        self.last = None;
        std::mem::take(&mut self.pending)
    }
}
