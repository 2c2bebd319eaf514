//! Drain worker loop.
//!
//! One drain runs to completion on its own thread: it admits head entries
//! while the region has a free slot, resolving each entry into exactly one
//! terminal reply. A failed or panicking admission only affects its own
//! entry.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug_span, error, info, info_span, warn};
use zonegate_core::{AdmissionError, ErrorCode, Outbound};
use zonegate_runtime::panic_message;

use crate::context::RegionContext;
use crate::events::AdmissionEvent;
use crate::queue::QueueEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The queue ran empty.
    Drained,
    /// Occupancy reached the ceiling; remaining entries wait for a later drain.
    CapacityExhausted,
    /// Shutdown was requested between two admissions.
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrainReport {
    pub(crate) admitted: usize,
    pub(crate) rejected: usize,
    pub(crate) stop: StopReason,
}

#[derive(Clone, Copy)]
enum Resolution {
    Admitted,
    Rejected(ErrorCode),
}

pub(crate) fn run_drain(ctx: &RegionContext) -> DrainReport {
    let span = info_span!("drain", region_id = %ctx.region_id);
    let _enter = span.enter();

    let queue_length = ctx.queue.len();
    info!(queue_len = queue_length, "start processing queue");
    ctx.emit(AdmissionEvent::DrainStarted {
        region_id: ctx.region_id,
        queue_length,
    });

    let mut admitted = 0;
    let mut rejected = 0;
    let stop = loop {
        if ctx.is_stopping() {
            break StopReason::ShuttingDown;
        }
        let capacity = ctx.capacity();
        if !capacity.has_free_slot() {
            break StopReason::CapacityExhausted;
        }
        let Some(entry) = ctx.queue.dequeue() else {
            break StopReason::Drained;
        };

        match admit_entry(ctx, &entry) {
            Resolution::Admitted => admitted += 1,
            Resolution::Rejected(_) => rejected += 1,
        }

        ctx.queue.notify_changed();
    };

    let report = DrainReport {
        admitted,
        rejected,
        stop,
    };
    info!(
        queue_len = ctx.queue.len(),
        admitted = report.admitted,
        rejected = report.rejected,
        stop = ?report.stop,
        "end processing queue"
    );
    ctx.emit(AdmissionEvent::DrainFinished {
        region_id: ctx.region_id,
        admitted: report.admitted,
        rejected: report.rejected,
        stop: report.stop,
    });
    report
}

fn admit_entry(ctx: &RegionContext, entry: &QueueEntry) -> Resolution {
    let participant = entry.participant();
    let span = debug_span!("admit", %participant, reply = %entry.reply());
    let _enter = span.enter();
    info!("start processing participant");

    let attempt = catch_unwind(AssertUnwindSafe(|| ctx.loader.attempt_admit(participant)));
    let (outbound, resolution) = match attempt {
        Ok(Ok(placement)) => (
            Outbound::Admitted {
                command: entry.reply().clone(),
                placement,
            },
            Resolution::Admitted,
        ),
        Ok(Err(err)) => {
            log_rejection(&err);
            let code = err.code();
            (rejection(entry, code), Resolution::Rejected(code))
        },
        Err(payload) => {
            error!("admission attempt panicked: {}", panic_message(payload));
            let code = ErrorCode::InternalFault;
            (rejection(entry, code), Resolution::Rejected(code))
        },
    };

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| {
        ctx.replies.send(participant, outbound);
    })) {
        error!("reply delivery panicked: {}", panic_message(payload));
    }

    ctx.emit(match resolution {
        Resolution::Admitted => AdmissionEvent::Admitted { participant },
        Resolution::Rejected(code) => AdmissionEvent::Rejected { participant, code },
    });
    info!("end processing participant");
    resolution
}

fn rejection(entry: &QueueEntry, code: ErrorCode) -> Outbound {
    Outbound::Rejected {
        command: entry.reply().clone(),
        code,
    }
}

fn log_rejection(err: &AdmissionError) {
    match err {
        AdmissionError::InternalFault { message } => {
            error!(code = err.code().as_str(), "admission failed: {message}");
        },
        _ => warn!(code = err.code().as_str(), "admission rejected: {err}"),
    }
}

#[cfg(test)]
#[path = "tests/drain.rs"]
mod tests;
