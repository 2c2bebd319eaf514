//! Tick-driven drain scheduling with a single-flight guard.
//!
//! The processing flag lives behind its own lock. It is set by the thread that
//! is about to spawn a worker and cleared by [`ProcessingGuard`] when the
//! worker body ends, whether it returns or unwinds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};
use zonegate_core::{ErrorCode, Outbound};
use zonegate_runtime::{IntervalTimer, TaskHandle, spawn_task};

use crate::config::WaitPolicy;
use crate::context::RegionContext;
use crate::error::ServiceError;
use crate::events::AdmissionEvent;
use crate::worker::run_drain;

/// Outcome of a start-drain check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStart {
    Started,
    AlreadyRunning,
    QueueEmpty,
    CapacityFull,
    ShuttingDown,
}

#[derive(Default)]
struct DrainSlot {
    processing: bool,
    /// A worker was spawned but its handle is not in `tasks` yet.
    registering: bool,
    tasks: Vec<TaskHandle>,
}

struct ProcessingGuard {
    slot: Arc<Mutex<DrainSlot>>,
}

impl ProcessingGuard {
    fn new(slot: Arc<Mutex<DrainSlot>>) -> Self {
        Self { slot }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.slot.lock().processing = false;
    }
}

pub(crate) struct DrainScheduler {
    timer: Mutex<IntervalTimer>,
    wait_policy: WaitPolicy,
    slot: Arc<Mutex<DrainSlot>>,
}

impl DrainScheduler {
    pub(crate) fn new(drain_interval: Duration, wait_policy: WaitPolicy) -> Self {
        Self {
            timer: Mutex::new(IntervalTimer::new(drain_interval)),
            wait_policy,
            slot: Arc::new(Mutex::new(DrainSlot::default())),
        }
    }

    /// Advances the interval timer; on each elapsed interval expires overdue
    /// entries and attempts to start a drain.
    pub(crate) fn on_tick(
        &self,
        ctx: &Arc<RegionContext>,
        elapsed: Duration,
    ) -> Result<Option<DrainStart>, ServiceError> {
        if !self.timer.lock().update(elapsed) {
            return Ok(None);
        }
        self.expire_overdue(ctx);
        self.try_start_drain(ctx).map(Some)
    }

    pub(crate) fn try_start_drain(
        &self,
        ctx: &Arc<RegionContext>,
    ) -> Result<DrainStart, ServiceError> {
        if ctx.is_stopping() {
            return Ok(DrainStart::ShuttingDown);
        }
        if ctx.queue.is_empty() {
            return Ok(DrainStart::QueueEmpty);
        }
        // The oracle is external and may be slow; keep it out of the slot lock.
        let capacity = ctx.capacity();
        if !capacity.has_free_slot() {
            debug!(
                current = capacity.current,
                max = capacity.max,
                "region full, drain deferred"
            );
            return Ok(DrainStart::CapacityFull);
        }
        {
            let mut slot = self.slot.lock();
            // Checked again under the lock so a drain can never start after
            // `wait_idle` has observed an idle slot during shutdown.
            if ctx.is_stopping() {
                return Ok(DrainStart::ShuttingDown);
            }
            if slot.processing {
                return Ok(DrainStart::AlreadyRunning);
            }
            slot.processing = true;
            slot.registering = true;
            slot.tasks.retain(|task| !task.is_finished());
        }

        // Spawn outside the slot lock: a failed spawn drops the guard, which
        // needs that lock to clear the flag.
        let guard = ProcessingGuard::new(Arc::clone(&self.slot));
        let worker_ctx = Arc::clone(ctx);
        let spawned = spawn_task(format!("zonegate-drain-{}", ctx.region_id.get()), move || {
            let _guard = guard;
            run_drain(&worker_ctx);
        });

        let mut slot = self.slot.lock();
        slot.registering = false;
        let task = spawned.map_err(|source| ServiceError::SpawnDrainWorker { source })?;
        slot.tasks.push(task);
        Ok(DrainStart::Started)
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.slot.lock().processing
    }

    /// Blocks until no drain is active or `timeout` elapses.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let tasks = {
                let mut slot = self.slot.lock();
                if !slot.processing && !slot.registering {
                    return true;
                }
                std::mem::take(&mut slot.tasks)
            };

            if tasks.is_empty() {
                std::thread::sleep(Duration::from_millis(1));
            }
            for task in &tasks {
                task.wait(deadline.saturating_duration_since(Instant::now()));
            }
            self.slot.lock().tasks.extend(tasks);

            if Instant::now() >= deadline {
                let slot = self.slot.lock();
                return !slot.processing && !slot.registering;
            }
        }
    }

    /// Joins every tracked drain thread. Call after the drains have gone idle.
    pub(crate) fn join_finished(&self) {
        let tasks = std::mem::take(&mut self.slot.lock().tasks);
        for task in tasks {
            if !task.is_finished() {
                self.slot.lock().tasks.push(task);
                continue;
            }
            if let Err(err) = task.join() {
                warn!("drain worker ended abnormally: {err}");
            }
        }
    }

    fn expire_overdue(&self, ctx: &RegionContext) {
        let WaitPolicy::Bounded(max_wait) = self.wait_policy else {
            return;
        };
        let Some(cutoff) = Instant::now().checked_sub(max_wait) else {
            return;
        };
        for entry in ctx.queue.expire_older_than(cutoff) {
            let participant = entry.participant();
            warn!(%participant, ?max_wait, "queue wait expired");
            ctx.replies.send(
                participant,
                Outbound::Rejected {
                    command: entry.reply().clone(),
                    code: ErrorCode::WaitExpired,
                },
            );
            ctx.emit(AdmissionEvent::Expired { participant });
        }
    }
}

#[cfg(test)]
#[path = "tests/scheduler.rs"]
mod tests;
