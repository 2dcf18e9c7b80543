//! Refresh controller.
//!
//! Drives fetch, normalize, classify, aggregate and render, either on a
//! fixed interval or on a manual trigger. Cycles never overlap: the run loop
//! is single-threaded, a trigger that arrives while a cycle is in flight is
//! discarded, and the next automatic cycle is scheduled one interval after
//! the previous one completes.
//!
//! A failed cycle leaves the previously rendered snapshot on screen and
//! raises the error banner; nothing about a failure is fatal.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::analysis::pipeline::{Pipeline, RecordTally};
use crate::ingest::RecordSource;
use crate::logging::{Channel, log_cycle_summary, log_source_failure};
use crate::model::{DashboardSnapshot, SourceError};
use crate::render::DashboardContext;
use crate::schedule::{ScheduledTask, earliest_deadline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Nothing loaded yet.
    Idle,
    Loading,
    Rendered,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Rendered,
    Failed(SourceError),
    /// A cycle was already in flight.
    Skipped,
}

/// Operator input delivered to the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Shutdown,
}

pub struct RefreshController<S: RecordSource> {
    source: S,
    pipeline: Pipeline,
    interval: Duration,
    state: RefreshState,
    snapshot: Option<DashboardSnapshot>,
    last_tally: Option<RecordTally>,
    timer: ScheduledTask,
}

impl<S: RecordSource> RefreshController<S> {
    /// A zero `interval` means a single load with no timer.
    pub fn new(source: S, pipeline: Pipeline, interval: Duration) -> Self {
        Self {
            source,
            pipeline,
            interval,
            state: RefreshState::Idle,
            snapshot: None,
            last_tally: None,
            timer: ScheduledTask::stopped(),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// The snapshot currently on screen.
    pub fn snapshot(&self) -> Option<&DashboardSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_tally(&self) -> Option<&RecordTally> {
        self.last_tally.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs one full cycle. `now` drives the auto-focus timer and `wall_now`
    /// fixes "today" for every record in the cycle.
    pub fn run_cycle(
        &mut self,
        ctx: &mut DashboardContext,
        now: Instant,
        wall_now: DateTime<Utc>,
    ) -> CycleOutcome {
        if self.state == RefreshState::Loading {
            tracing::debug!(channel = %Channel::System, "refresh already in flight, skipping");
            return CycleOutcome::Skipped;
        }

        self.state = RefreshState::Loading;
        ctx.begin_loading();

        let outcome = match self.source.fetch() {
            Ok(payload) => {
                let (snapshot, tally) = self.pipeline.build(payload, wall_now);
                log_cycle_summary(tally.total, tally.accepted, tally.dropped());
                ctx.render(&snapshot, now, wall_now);
                self.snapshot = Some(snapshot);
                self.last_tally = Some(tally);
                self.state = RefreshState::Rendered;
                CycleOutcome::Rendered
            }
            Err(err) => {
                log_source_failure(Channel::Source, "refresh", &err);
                ctx.show_error(err.to_string());
                self.state = RefreshState::Failed;
                CycleOutcome::Failed(err)
            }
        };

        ctx.end_loading();
        outcome
    }

    /// Runs until a `Shutdown` trigger, or after the first cycle when the
    /// interval is zero. Returns the outcome of the last cycle.
    pub fn run(
        &mut self,
        ctx: &mut DashboardContext,
        triggers: Option<Receiver<Trigger>>,
    ) -> CycleOutcome {
        let mut triggers = triggers;
        let mut last = self.cycle_now(ctx, "startup");
        if self.interval.is_zero() {
            return last;
        }
        if discard_pending(&mut triggers) {
            return last;
        }

        loop {
            let deadline = earliest_deadline([&self.timer, ctx.focus.task()]);
            let wait = deadline.map(|d| d.saturating_duration_since(Instant::now()));

            let manual = match (triggers.as_ref(), wait) {
                (Some(rx), wait) => match wait_for_trigger(rx, wait) {
                    Wake::Trigger(trigger) => Some(trigger),
                    Wake::Timeout => None,
                    Wake::Disconnected => {
                        triggers = None;
                        None
                    }
                },
                (None, Some(wait)) => {
                    thread::sleep(wait);
                    None
                }
                // No timers and no way to be woken up.
                (None, None) => return last,
            };

            match manual {
                Some(Trigger::Shutdown) => return last,
                Some(Trigger::Manual) => {
                    last = self.cycle_now(ctx, "manual");
                    if discard_pending(&mut triggers) {
                        return last;
                    }
                    continue;
                }
                None => {}
            }

            let now = Instant::now();
            ctx.tick_focus(now);
            if self.timer.poll(now) {
                last = self.cycle_now(ctx, "timer");
                if discard_pending(&mut triggers) {
                    return last;
                }
            }
        }
    }

    /// One cycle at the current instant, then the timer restarts from the
    /// moment it completed.
    fn cycle_now(&mut self, ctx: &mut DashboardContext, reason: &str) -> CycleOutcome {
        tracing::info!(channel = %Channel::System, trigger = reason, "refreshing");
        let outcome = self.run_cycle(ctx, Instant::now(), Utc::now());
        self.timer.start(Instant::now(), self.interval);
        outcome
    }
}

enum Wake {
    Trigger(Trigger),
    Timeout,
    Disconnected,
}

/// Blocks until a trigger arrives or `wait` elapses; `None` waits forever.
fn wait_for_trigger(rx: &Receiver<Trigger>, wait: Option<Duration>) -> Wake {
    match wait {
        Some(wait) => match rx.recv_timeout(wait) {
            Ok(trigger) => Wake::Trigger(trigger),
            Err(RecvTimeoutError::Timeout) => Wake::Timeout,
            Err(RecvTimeoutError::Disconnected) => Wake::Disconnected,
        },
        None => rx.recv().map_or(Wake::Disconnected, Wake::Trigger),
    }
}

/// Drops triggers that queued up while a cycle was running. Returns true if
/// one of them asked for shutdown.
fn discard_pending(triggers: &mut Option<Receiver<Trigger>>) -> bool {
    let Some(rx) = triggers.as_ref() else {
        return false;
    };
    let mut discarded = 0;
    let mut disconnected = false;
    loop {
        match rx.try_recv() {
            Ok(Trigger::Manual) => discarded += 1,
            Ok(Trigger::Shutdown) => return true,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                disconnected = true;
                break;
            }
        }
    }
    if disconnected {
        *triggers = None;
    }
    if discarded > 0 {
        tracing::debug!(
            channel = %Channel::System,
            discarded,
            "ignored refresh requests made during a cycle"
        );
    }
    false
}

/// Reads operator commands from stdin on a background thread: an empty line
/// or `r` refreshes, `q` quits. EOF just ends the thread.
pub fn spawn_stdin_triggers() -> Receiver<Trigger> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let trigger = match line.trim() {
                "" | "r" | "refresh" => Trigger::Manual,
                "q" | "quit" | "exit" => Trigger::Shutdown,
                other => {
                    tracing::warn!(channel = %Channel::System, "unknown command {other:?}");
                    continue;
                }
            };
            if tx.send(trigger).is_err() {
                break;
            }
        }
    });
    rx
}
