//! In-process stand-in for a region: who is inside, who may enter, and where
//! replies go.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};
use zonegate_admission::{AdmissionDeps, CapacityOracle, ParticipantLoader, ReplyChannel};
use zonegate_core::{AdmissionError, Outbound, ParticipantId, PlacementInfo, RegionId};

use crate::config::Arrival;

struct RosterEntry {
    banned: bool,
    stay: Duration,
}

pub struct SimRegion {
    region_id: RegionId,
    roster: HashMap<ParticipantId, RosterEntry>,
    /// Occupants and when they leave.
    occupants: Mutex<HashMap<ParticipantId, Instant>>,
}

impl SimRegion {
    pub fn new(region_id: RegionId, arrivals: &[Arrival]) -> Self {
        Self {
            region_id,
            roster: arrivals
                .iter()
                .map(|arrival| {
                    let entry = RosterEntry {
                        banned: arrival.banned,
                        stay: arrival.stay,
                    };
                    (arrival.participant, entry)
                })
                .collect(),
            occupants: Mutex::new(HashMap::new()),
        }
    }

    pub fn deps(self: &Arc<Self>) -> AdmissionDeps {
        AdmissionDeps {
            oracle: self.clone(),
            loader: self.clone(),
            replies: self.clone(),
        }
    }

    /// Removes and returns every occupant whose stay has ended by `now`.
    pub fn depart_due(&self, now: Instant) -> Vec<ParticipantId> {
        let mut occupants = self.occupants.lock();
        let due = occupants
            .iter()
            .filter(|(_, leaves_at)| **leaves_at <= now)
            .map(|(participant, _)| *participant)
            .collect::<Vec<_>>();
        for participant in &due {
            occupants.remove(participant);
        }
        due
    }

    pub fn occupancy(&self) -> usize {
        self.occupants.lock().len()
    }

    fn placement(&self, participant: ParticipantId) -> PlacementInfo {
        PlacementInfo {
            participant,
            region_id: self.region_id,
            ticket: format!("{}-{}", self.region_id.get(), participant.get()),
            details: json!({ "spawn": [0, 0] }),
        }
    }
}

impl CapacityOracle for SimRegion {
    fn current_occupancy(&self) -> usize {
        self.occupancy()
    }
}

impl ParticipantLoader for SimRegion {
    fn attempt_admit(&self, participant: ParticipantId) -> Result<PlacementInfo, AdmissionError> {
        let Some(entry) = self.roster.get(&participant) else {
            return Err(AdmissionError::NotFound { participant });
        };
        if entry.banned {
            return Err(AdmissionError::Unauthorized { participant });
        }

        let mut occupants = self.occupants.lock();
        if occupants.contains_key(&participant) {
            debug!(%participant, "already in region, reusing placement");
        } else {
            occupants.insert(participant, Instant::now() + entry.stay);
        }
        Ok(self.placement(participant))
    }
}

impl ReplyChannel for SimRegion {
    fn send(&self, participant: ParticipantId, payload: Outbound) {
        let command = payload.command();
        match serde_json::to_string(&payload) {
            Ok(body) if payload.is_terminal() => {
                info!(%participant, %command, body = %body, "reply");
            },
            Ok(body) => debug!(%participant, %command, body = %body, "reply"),
            Err(err) => warn!(%participant, %command, "failed to encode reply: {err}"),
        }
    }
}
