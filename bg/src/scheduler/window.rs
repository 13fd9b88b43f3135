//! RateWindow - sliding-window admission tracker
//!
//! Keeps one timestamp per admission and answers how many more admissions
//! fit in the rolling window ending at a given instant.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct RateWindow {
    /// Admission timestamps, oldest first
    admissions: VecDeque<Instant>,
    limit: usize,
    window: Duration,
}

impl RateWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        debug!(limit, ?window, "RateWindow::new: called");
        Self {
            admissions: VecDeque::new(),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Record `n` admissions at `at`
    pub fn record(&mut self, n: usize, at: Instant) {
        debug!(n, "RateWindow::record: called");
        self.admissions.extend(std::iter::repeat_n(at, n));
    }

    /// Drop admissions that are a full window or more behind `at`
    pub fn prune(&mut self, at: Instant) {
        while let Some(&oldest) = self.admissions.front() {
            if at.saturating_duration_since(oldest) >= self.window {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admissions inside `(at - window, at]`
    pub fn in_window(&mut self, at: Instant) -> usize {
        self.prune(at);
        self.admissions.len()
    }

    /// Admissions still allowed in the window ending at `at`, floored at 0
    pub fn available(&mut self, at: Instant) -> usize {
        let used = self.in_window(at);
        let available = self.limit.saturating_sub(used);
        debug!(used, available, "RateWindow::available: computed");
        available
    }

    /// Time until the oldest admission ages out, if the window is full
    pub fn retry_after(&mut self, at: Instant) -> Option<Duration> {
        if self.available(at) > 0 {
            return None;
        }
        self.admissions
            .front()
            .map(|&oldest| self.window.saturating_sub(at.saturating_duration_since(oldest)))
    }
}
