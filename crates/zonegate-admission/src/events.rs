use tokio::sync::broadcast;
use zonegate_core::{ErrorCode, ParticipantId, RegionId};

use crate::worker::StopReason;

/// Lifecycle events published for monitoring and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionEvent {
    Enqueued {
        participant: ParticipantId,
        queue_length: usize,
    },
    Cancelled {
        participant: ParticipantId,
    },
    Expired {
        participant: ParticipantId,
    },
    DrainStarted {
        region_id: RegionId,
        queue_length: usize,
    },
    Admitted {
        participant: ParticipantId,
    },
    Rejected {
        participant: ParticipantId,
        code: ErrorCode,
    },
    DrainFinished {
        region_id: RegionId,
        admitted: usize,
        rejected: usize,
        stop: StopReason,
    },
}

pub(crate) struct EventHub {
    tx: broadcast::Sender<AdmissionEvent>,
}

impl EventHub {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn emit(&self, event: AdmissionEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<AdmissionEvent> {
        self.tx.subscribe()
    }
}
