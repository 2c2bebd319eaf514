use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, info_span, warn};
use zonegate_core::{ParticipantId, QueueInfo, RegionId, ReplyCommand};

use crate::collaborators::AdmissionDeps;
use crate::config::AdmissionConfig;
use crate::context::RegionContext;
use crate::error::ServiceError;
use crate::events::{AdmissionEvent, EventHub};
use crate::notify::{ChangeNotifier, PositionBroadcaster, QueueListener};
use crate::queue::{AdmissionQueue, QueueEntry, QueueSnapshot};
use crate::scheduler::{DrainScheduler, DrainStart};

/// Cloneable handle to one region's admission queue.
///
/// The external update loop calls [`AdmissionService::on_tick`]; request
/// handlers call [`AdmissionService::enqueue`] and
/// [`AdmissionService::remove`]. Drains run on their own threads.
#[derive(Clone)]
pub struct AdmissionService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    ctx: Arc<RegionContext>,
    scheduler: DrainScheduler,
    shutdown_timeout: Duration,
}

impl AdmissionService {
    pub fn new(config: AdmissionConfig, deps: AdmissionDeps) -> Result<Self, ServiceError> {
        config.validate()?;

        let notifier = ChangeNotifier::new();
        notifier.register(Arc::new(PositionBroadcaster::new(Arc::clone(&deps.replies))));
        let queue = AdmissionQueue::new(notifier);
        let ctx = Arc::new(RegionContext::new(
            config.region_id,
            config.max_occupancy,
            queue,
            deps,
            EventHub::new(config.event_capacity),
        ));

        info!(
            region_id = %config.region_id,
            max_occupancy = config.max_occupancy,
            drain_interval_ms = config.drain_interval.as_millis() as u64,
            wait_policy = ?config.wait_policy,
            "admission service started"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                ctx,
                scheduler: DrainScheduler::new(config.drain_interval, config.wait_policy),
                shutdown_timeout: config.shutdown_timeout,
            }),
        })
    }

    pub fn region_id(&self) -> RegionId {
        self.inner.ctx.region_id
    }

    pub fn enqueue(
        &self,
        participant: ParticipantId,
        reply: ReplyCommand,
    ) -> Result<(), ServiceError> {
        let ctx = &self.inner.ctx;
        if ctx.is_stopping() {
            return Err(ServiceError::ShuttingDown);
        }

        let span = info_span!("enqueue", region_id = %ctx.region_id, %participant, %reply);
        let _enter = span.enter();
        info!("start enqueue participant");
        let queue_length = ctx.queue.enqueue(QueueEntry::new(participant, reply));
        ctx.emit(AdmissionEvent::Enqueued {
            participant,
            queue_length,
        });
        info!(queue_len = queue_length, "end enqueue participant");
        Ok(())
    }

    /// Cancels every waiting entry of `participant`.
    ///
    /// Entries already taken by a drain are not affected.
    pub fn remove(&self, participant: ParticipantId) -> bool {
        let ctx = &self.inner.ctx;
        let changed = ctx.queue.remove(participant);
        if changed {
            info!(region_id = %ctx.region_id, %participant, "participant left the queue");
            ctx.emit(AdmissionEvent::Cancelled { participant });
        }
        changed
    }

    /// Feeds elapsed time from the update loop.
    ///
    /// Returns `None` until the drain interval has passed, then the outcome of
    /// the start-drain check.
    pub fn on_tick(&self, elapsed: Duration) -> Result<Option<DrainStart>, ServiceError> {
        self.inner.scheduler.on_tick(&self.inner.ctx, elapsed)
    }

    pub fn try_start_drain(&self) -> Result<DrainStart, ServiceError> {
        self.inner.scheduler.try_start_drain(&self.inner.ctx)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.scheduler.is_processing()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.scheduler.wait_idle(timeout)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.ctx.queue.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.ctx.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.ctx.queue.is_empty()
    }

    pub fn queue_info(&self) -> QueueInfo {
        let ctx = &self.inner.ctx;
        QueueInfo {
            region_id: ctx.region_id,
            max_occupancy: ctx.max_occupancy(),
            queue_length: ctx.queue.len(),
        }
    }

    pub fn max_occupancy(&self) -> usize {
        self.inner.ctx.max_occupancy()
    }

    pub fn set_max_occupancy(&self, max: usize) {
        let ctx = &self.inner.ctx;
        info!(region_id = %ctx.region_id, max_occupancy = max, "max occupancy changed");
        ctx.set_max_occupancy(max);
    }

    /// Registers a listener that runs after the built-in position broadcast.
    pub fn add_listener(&self, listener: Arc<dyn QueueListener>) {
        self.inner.ctx.queue.notifier().register(listener);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AdmissionEvent> {
        self.inner.ctx.events().subscribe()
    }

    /// Stops accepting entries, lets an active drain finish its current
    /// admission, and joins drain threads.
    ///
    /// Entries still waiting are left in place.
    pub fn shutdown(&self) -> Result<(), ServiceError> {
        let ctx = &self.inner.ctx;
        ctx.request_stop();
        let timeout = self.inner.shutdown_timeout;
        if !self.inner.scheduler.wait_idle(timeout) {
            warn!(region_id = %ctx.region_id, "drain still running at shutdown");
            return Err(ServiceError::ShutdownTimedOut {
                timeout_ms: timeout.as_millis(),
            });
        }
        self.inner.scheduler.join_finished();
        info!(
            region_id = %ctx.region_id,
            queue_len = ctx.queue.len(),
            "admission service stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/service.rs"]
mod tests;
