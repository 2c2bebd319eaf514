use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use zonegate_core::RegionId;

use crate::collaborators::{
    AdmissionDeps, CapacityOracle, CapacitySnapshot, ParticipantLoader, ReplyChannel,
};
use crate::events::{AdmissionEvent, EventHub};
use crate::queue::AdmissionQueue;

/// State shared between the service handle, the scheduler and drain workers.
pub(crate) struct RegionContext {
    pub(crate) region_id: RegionId,
    pub(crate) queue: AdmissionQueue,
    pub(crate) oracle: Arc<dyn CapacityOracle>,
    pub(crate) loader: Arc<dyn ParticipantLoader>,
    pub(crate) replies: Arc<dyn ReplyChannel>,
    max_occupancy: AtomicUsize,
    stopping: AtomicBool,
    events: EventHub,
}

impl RegionContext {
    pub(crate) fn new(
        region_id: RegionId,
        max_occupancy: usize,
        queue: AdmissionQueue,
        deps: AdmissionDeps,
        events: EventHub,
    ) -> Self {
        Self {
            region_id,
            queue,
            oracle: deps.oracle,
            loader: deps.loader,
            replies: deps.replies,
            max_occupancy: AtomicUsize::new(max_occupancy),
            stopping: AtomicBool::new(false),
            events,
        }
    }

    pub(crate) fn max_occupancy(&self) -> usize {
        self.max_occupancy.load(Ordering::Acquire)
    }

    pub(crate) fn set_max_occupancy(&self, max: usize) {
        self.max_occupancy.store(max, Ordering::Release);
    }

    /// Reads occupancy from the oracle; never cached between attempts.
    pub(crate) fn capacity(&self) -> CapacitySnapshot {
        CapacitySnapshot {
            current: self.oracle.current_occupancy(),
            max: self.max_occupancy(),
        }
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn request_stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    pub(crate) fn emit(&self, event: AdmissionEvent) {
        self.events.emit(event);
    }

    pub(crate) fn events(&self) -> &EventHub {
        &self.events
    }
}
