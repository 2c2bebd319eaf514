use std::time::Duration;

use zonegate_core::RegionId;

use crate::error::ServiceError;

/// How long an entry may stay in the waiting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Entries wait until admitted or cancelled.
    #[default]
    Indefinite,
    /// Entries that have waited longer than the bound are rejected on the
    /// next scheduler pass with `ErrorCode::WaitExpired`.
    Bounded(Duration),
}

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub region_id: RegionId,
    pub max_occupancy: usize,
    pub drain_interval: Duration,
    pub wait_policy: WaitPolicy,
    pub event_capacity: usize,
    pub shutdown_timeout: Duration,
}

impl AdmissionConfig {
    pub fn new(region_id: RegionId, max_occupancy: usize) -> Self {
        Self {
            region_id,
            max_occupancy,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.drain_interval.is_zero() {
            return Err(ServiceError::InvalidConfig {
                reason: "drain interval must be non-zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ServiceError::InvalidConfig {
                reason: "event capacity must be non-zero".to_string(),
            });
        }
        if let WaitPolicy::Bounded(max_wait) = self.wait_policy
            && max_wait.is_zero()
        {
            return Err(ServiceError::InvalidConfig {
                reason: "bounded wait must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            region_id: RegionId::new(0),
            max_occupancy: 0,
            drain_interval: Duration::from_secs(2),
            wait_policy: WaitPolicy::Indefinite,
            event_capacity: 256,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}
