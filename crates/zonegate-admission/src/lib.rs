//! Capacity-gated admission into a region.
//!
//! Participants that cannot enter a full region wait in a FIFO line. A tick
//! from the host's update loop periodically starts a single drain worker that
//! admits head entries while the region has room, and every change to the line
//! is fanned out to registered listeners (by default, a position update to each
//! waiting participant).

mod collaborators;
mod config;
mod context;
mod error;
mod events;
mod notify;
mod queue;
mod scheduler;
mod service;
mod worker;

#[cfg(test)]
mod tests;

pub use collaborators::{
    AdmissionDeps, CapacityOracle, CapacitySnapshot, ParticipantLoader, ReplyChannel,
};
pub use config::{AdmissionConfig, WaitPolicy};
pub use error::ServiceError;
pub use events::AdmissionEvent;
pub use notify::{ChangeNotifier, PositionBroadcaster, QueueListener};
pub use queue::{AdmissionQueue, QueueEntry, QueueSnapshot};
pub use scheduler::DrainStart;
pub use service::AdmissionService;
pub use worker::StopReason;
