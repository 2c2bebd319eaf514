//! Admission failure taxonomy shared by loaders and the admission service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ParticipantId, RegionId};

/// Error code carried by a rejection reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    AlreadyElsewhere,
    Unauthorized,
    InternalFault,
    /// Only produced when a bounded wait policy is configured.
    WaitExpired,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyElsewhere => "already_elsewhere",
            Self::Unauthorized => "unauthorized",
            Self::InternalFault => "internal_fault",
            Self::WaitExpired => "wait_expired",
        }
    }
}

/// Classified failure returned by a participant loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The participant has no record the loader can materialize.
    #[error("{participant} not found")]
    NotFound {
        /// Participant that was looked up.
        participant: ParticipantId,
    },
    /// The participant is currently placed in another region.
    #[error("{participant} is already in {region_id}")]
    AlreadyElsewhere {
        /// Participant that was looked up.
        participant: ParticipantId,
        /// Region currently holding the participant.
        region_id: RegionId,
    },
    /// The participant may not enter this region.
    #[error("{participant} is not allowed to enter")]
    Unauthorized {
        /// Participant that was refused.
        participant: ParticipantId,
    },
    /// Storage or placement failed for a reason the caller cannot act on.
    #[error("internal fault: {message}")]
    InternalFault {
        /// Diagnostic text, logged but not sent to the participant.
        message: String,
    },
}

impl AdmissionError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFault {
            message: message.into(),
        }
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyElsewhere { .. } => ErrorCode::AlreadyElsewhere,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::InternalFault { .. } => ErrorCode::InternalFault,
        }
    }
}
