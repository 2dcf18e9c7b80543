//! Auto-focus: pan the map to each due site in turn.

use std::time::{Duration, Instant};

use crate::model::Coordinates;
use crate::render::MapView;
use crate::schedule::ScheduledTask;

#[derive(Debug, Clone)]
pub struct FocusCycle {
    task: ScheduledTask,
    interval: Duration,
    zoom: u8,
    targets: Vec<Coordinates>,
    next: usize,
}

impl FocusCycle {
    /// A zero `interval` disables auto-focus.
    pub fn new(interval: Duration, zoom: u8) -> Self {
        Self {
            task: ScheduledTask::stopped(),
            interval,
            zoom,
            targets: Vec::new(),
            next: 0,
        }
    }

    /// Replaces the targets and restarts the timer from `now`. The old timer
    /// is cancelled first; with no targets the cycle stays stopped.
    pub fn restart(&mut self, targets: Vec<Coordinates>, now: Instant) {
        self.task.stop();
        self.targets = targets;
        self.next = 0;
        if !self.targets.is_empty() {
            self.task.start(now, self.interval);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn task(&self) -> &ScheduledTask {
        &self.task
    }

    /// Focuses the next target if the interval elapsed, wrapping around.
    pub fn tick(&mut self, now: Instant, map: &mut MapView) -> bool {
        if self.targets.is_empty() || !self.task.poll(now) {
            return false;
        }
        map.focus(self.targets[self.next], self.zoom);
        self.next = (self.next + 1) % self.targets.len();
        true
    }
}
