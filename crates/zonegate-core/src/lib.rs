mod error;
mod ids;
mod reply;

pub use error::{AdmissionError, ErrorCode};
pub use ids::{ParticipantId, RegionId, ReplyCommand};
pub use reply::{Outbound, PlacementInfo, QueueInfo};
