use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::ids::{ParticipantId, RegionId, ReplyCommand};

/// Placement data produced by a successful admission.
///
/// `details` is opaque to the admission service; the loader fills it with
/// whatever the client needs to enter the region (robot state, decor, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementInfo {
    pub participant: ParticipantId,
    pub region_id: RegionId,
    pub ticket: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    Admitted {
        command: ReplyCommand,
        placement: PlacementInfo,
    },
    Rejected {
        command: ReplyCommand,
        code: ErrorCode,
    },
    QueueStatus {
        length: usize,
        current: usize,
    },
}

impl Outbound {
    pub fn command(&self) -> ReplyCommand {
        match self {
            Self::Admitted { command, .. } | Self::Rejected { command, .. } => command.clone(),
            Self::QueueStatus { .. } => ReplyCommand::queue_status(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::QueueStatus { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub region_id: RegionId,
    pub max_occupancy: usize,
    pub queue_length: usize,
}
