use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::json;
use zonegate_core::{AdmissionError, Outbound, ParticipantId, PlacementInfo, RegionId};

use crate::collaborators::{AdmissionDeps, CapacityOracle, ParticipantLoader, ReplyChannel};
use crate::context::RegionContext;
use crate::events::EventHub;
use crate::notify::{ChangeNotifier, PositionBroadcaster};
use crate::queue::{AdmissionQueue, QueueEntry};

pub(crate) const REGION: RegionId = RegionId::new(7);
pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) fn pid(id: u64) -> ParticipantId {
    ParticipantId::new(id)
}

pub(crate) fn entry(id: u64) -> QueueEntry {
    QueueEntry::new(pid(id), "zoneEnter".into())
}

pub(crate) fn placement(participant: ParticipantId) -> PlacementInfo {
    PlacementInfo {
        participant,
        region_id: REGION,
        ticket: format!("ticket-{}", participant.get()),
        details: json!({ "plugin": "test" }),
    }
}

pub(crate) struct OracleGate {
    pub(crate) entered: Receiver<()>,
    pub(crate) release: Sender<()>,
}

#[derive(Default)]
pub(crate) struct FakeOracle {
    occupancy: AtomicUsize,
    panic_on_read: AtomicUsize,
    reads: AtomicUsize,
    hold: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl FakeOracle {
    pub(crate) fn with_occupancy(occupancy: usize) -> Self {
        Self {
            occupancy: AtomicUsize::new(occupancy),
            ..Self::default()
        }
    }

    pub(crate) fn set(&self, occupancy: usize) {
        self.occupancy.store(occupancy, Ordering::SeqCst);
    }

    pub(crate) fn occupy(&self) {
        self.occupancy.fetch_add(1, Ordering::SeqCst);
    }

    /// Makes the `nth` read (1-based, counted from now) panic.
    pub(crate) fn panic_on_read(&self, nth: usize) {
        let reads = self.reads.load(Ordering::SeqCst);
        self.panic_on_read.store(reads + nth, Ordering::SeqCst);
    }

    /// Every read blocks until released through the gate. Dropping the gate
    /// releases all reads.
    pub(crate) fn hold_reads(&self) -> OracleGate {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        *self.hold.lock() = Some((entered_tx, release_rx));
        OracleGate {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl CapacityOracle for FakeOracle {
    fn current_occupancy(&self) -> usize {
        let hold = self.hold.lock().clone();
        if let Some((entered, release)) = hold {
            let _ = entered.send(());
            let _ = release.recv_timeout(WAIT);
        }
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read == self.panic_on_read.load(Ordering::SeqCst) {
            panic!("occupancy source unavailable");
        }
        self.occupancy.load(Ordering::SeqCst)
    }
}

enum Outcome {
    Fail(AdmissionError),
    Panic,
}

pub(crate) struct LoaderGate {
    pub(crate) started: Receiver<ParticipantId>,
    pub(crate) release: Sender<()>,
}

#[derive(Default)]
pub(crate) struct ScriptedLoader {
    outcomes: Mutex<HashMap<ParticipantId, Outcome>>,
    calls: Mutex<Vec<ParticipantId>>,
    occupies: Option<Arc<FakeOracle>>,
    gate: Option<(Sender<ParticipantId>, Receiver<()>)>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Admitted participants take a slot on `oracle`.
    pub(crate) fn occupying(mut self, oracle: Arc<FakeOracle>) -> Self {
        self.occupies = Some(oracle);
        self
    }

    /// Every attempt blocks until the test releases it through the gate.
    pub(crate) fn gated(mut self) -> (Self, LoaderGate) {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        self.gate = Some((started_tx, release_rx));
        (
            self,
            LoaderGate {
                started: started_rx,
                release: release_tx,
            },
        )
    }

    pub(crate) fn failing(self, id: u64, error: AdmissionError) -> Self {
        self.outcomes.lock().insert(pid(id), Outcome::Fail(error));
        self
    }

    pub(crate) fn panicking(self, id: u64) -> Self {
        self.outcomes.lock().insert(pid(id), Outcome::Panic);
        self
    }

    pub(crate) fn calls(&self) -> Vec<ParticipantId> {
        self.calls.lock().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ParticipantLoader for ScriptedLoader {
    fn attempt_admit(&self, participant: ParticipantId) -> Result<PlacementInfo, AdmissionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push(participant);

        if let Some((started, release)) = self.gate.as_ref() {
            let _ = started.send(participant);
            let _ = release.recv_timeout(WAIT);
        }

        let outcome = self.outcomes.lock().remove(&participant);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match outcome {
            Some(Outcome::Fail(error)) => Err(error),
            Some(Outcome::Panic) => panic!("loader crashed for {participant}"),
            None => {
                if let Some(oracle) = self.occupies.as_ref() {
                    oracle.occupy();
                }
                Ok(placement(participant))
            },
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingReplies {
    sent: Mutex<Vec<(ParticipantId, Outbound)>>,
}

impl RecordingReplies {
    pub(crate) fn all(&self) -> Vec<(ParticipantId, Outbound)> {
        self.sent.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Final replies in the order they were sent.
    pub(crate) fn terminal(&self) -> Vec<(ParticipantId, Outbound)> {
        self.all()
            .into_iter()
            .filter(|(_, payload)| payload.is_terminal())
            .collect()
    }

    /// `(length, current)` status updates received by `participant`.
    pub(crate) fn statuses_for(&self, participant: ParticipantId) -> Vec<(usize, usize)> {
        self.all()
            .into_iter()
            .filter(|(to, _)| *to == participant)
            .filter_map(|(_, payload)| match payload {
                Outbound::QueueStatus { length, current } => Some((length, current)),
                _ => None,
            })
            .collect()
    }
}

impl ReplyChannel for RecordingReplies {
    fn send(&self, participant: ParticipantId, payload: Outbound) {
        self.sent.lock().push((participant, payload));
    }
}

pub(crate) struct Harness {
    pub(crate) oracle: Arc<FakeOracle>,
    pub(crate) loader: Arc<ScriptedLoader>,
    pub(crate) replies: Arc<RecordingReplies>,
}

impl Harness {
    pub(crate) fn new(oracle: Arc<FakeOracle>, loader: ScriptedLoader) -> Self {
        Self {
            oracle,
            loader: Arc::new(loader),
            replies: Arc::new(RecordingReplies::default()),
        }
    }

    /// Unlimited region whose loader never fails.
    pub(crate) fn open() -> Self {
        Self::new(Arc::new(FakeOracle::default()), ScriptedLoader::new())
    }

    pub(crate) fn deps(&self) -> AdmissionDeps {
        AdmissionDeps {
            oracle: self.oracle.clone(),
            loader: self.loader.clone(),
            replies: self.replies.clone(),
        }
    }

    /// Region context wired the way the service wires it.
    pub(crate) fn context(&self, max_occupancy: usize) -> Arc<RegionContext> {
        let notifier = ChangeNotifier::new();
        notifier.register(Arc::new(PositionBroadcaster::new(self.replies.clone())));
        Arc::new(RegionContext::new(
            REGION,
            max_occupancy,
            AdmissionQueue::new(notifier),
            self.deps(),
            EventHub::new(64),
        ))
    }
}
