//! Seams to the systems the admission service drives but does not own.

use std::sync::Arc;

use zonegate_core::{AdmissionError, Outbound, ParticipantId, PlacementInfo};

/// Reports how many participants currently occupy the region.
///
/// Queried before every admission attempt; implementations must return a
/// fresh value because participants leave independently of the queue.
pub trait CapacityOracle: Send + Sync {
    fn current_occupancy(&self) -> usize;
}

/// Materializes a participant into the region.
///
/// Called from the drain worker thread; it may block on storage.
pub trait ParticipantLoader: Send + Sync {
    fn attempt_admit(&self, participant: ParticipantId) -> Result<PlacementInfo, AdmissionError>;
}

/// Fire-and-forget delivery of replies to a participant's session.
pub trait ReplyChannel: Send + Sync {
    fn send(&self, participant: ParticipantId, payload: Outbound);
}

#[derive(Clone)]
pub struct AdmissionDeps {
    pub oracle: Arc<dyn CapacityOracle>,
    pub loader: Arc<dyn ParticipantLoader>,
    pub replies: Arc<dyn ReplyChannel>,
}

/// Occupancy pair read for a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitySnapshot {
    pub current: usize,
    pub max: usize,
}

impl CapacitySnapshot {
    pub fn has_free_slot(&self) -> bool {
        self.current < self.max
    }
}
