//! Restartable periodic tickers.
//!
//! The service runs one cooperative loop. Each periodic job (auto refresh,
//! auto focus) is a `ScheduledTask` that the loop polls with the current
//! `Instant`; nothing here sleeps or spawns threads, so tests can drive a
//! task through hours of virtual time instantly.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct ScheduledTask {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl ScheduledTask {
    /// A task that is not running. `poll` always returns false until
    /// `start` is called.
    pub fn stopped() -> Self {
        Self::default()
    }

    /// (Re)starts the ticker: first tick `interval` after `now`. Any pending
    /// tick from a previous start is discarded, so restarting never leaves
    /// two tickers behind. A zero interval stops the task instead.
    pub fn start(&mut self, now: Instant, interval: Duration) {
        if interval.is_zero() {
            self.stop();
            return;
        }
        self.interval = Some(interval);
        self.next_due = Some(now + interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns true once per elapsed deadline and schedules the following
    /// tick `interval` after `now`. Missed ticks collapse into one.
    pub fn poll(&mut self, now: Instant) -> bool {
        match (self.next_due, self.interval) {
            (Some(due), Some(interval)) if now >= due => {
                self.next_due = Some(now + interval);
                true
            }
            _ => false,
        }
    }
}

/// Earliest of the running tasks' deadlines.
pub fn earliest_deadline<'a>(tasks: impl IntoIterator<Item = &'a ScheduledTask>) -> Option<Instant> {
    tasks.into_iter().filter_map(ScheduledTask::next_due).min()
}
