use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, Lane};

/// Which scheduler table a swept job came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepSource {
    /// Delay elapsed
    Delayed,
    /// Lease lapsed without acknowledgement
    Reserved,
}

/// Minimal stable event protocol for structured observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// Job was written to the tables
    Enqueued {
        job_id: JobId,
        lane: Lane,
        ready_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// Job was leased by a consumer
    Reserved {
        job_id: JobId,
        attempt: u64,
        lease_until: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// Sweep moved the job back into its lane
    Requeued {
        job_id: JobId,
        lane: Lane,
        from: SweepSource,
        at: DateTime<Utc>,
    },

    /// Job was acknowledged by its consumer
    Acknowledged {
        job_id: JobId,
        at: DateTime<Utc>,
    },

    /// Job was cancelled
    Canceled {
        job_id: JobId,
        at: DateTime<Utc>,
    },

    /// Every key of the channel was deleted
    Cleared {
        channel: String,
        keys: u64,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Reserved { .. } => "reserved",
            Self::Requeued { .. } => "requeued",
            Self::Acknowledged { .. } => "acknowledged",
            Self::Canceled { .. } => "canceled",
            Self::Cleared { .. } => "cleared",
        }
    }

    /// Get the job ID, if the event concerns a single job
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Enqueued { job_id, .. }
            | Self::Reserved { job_id, .. }
            | Self::Requeued { job_id, .. }
            | Self::Acknowledged { job_id, .. }
            | Self::Canceled { job_id, .. } => Some(*job_id),
            Self::Cleared { .. } => None,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. }
            | Self::Reserved { at, .. }
            | Self::Requeued { at, .. }
            | Self::Acknowledged { at, .. }
            | Self::Canceled { at, .. }
            | Self::Cleared { at, .. } => at,
        }
    }

    /// Render the event as a JSON line for log shipping
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> crate::QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
