use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Job status as observed through the store
///
/// `Waiting` covers both ready and delayed jobs. `Reserved` is reported from
/// the Attempts table, so a job whose lease has lapsed keeps reporting
/// `Reserved` until the next sweep puts it back in its lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job exists and has not been reserved yet (ready or delayed)
    Waiting,

    /// Job has been reserved at least once and is not done
    Reserved,

    /// Job was acknowledged, cancelled, or never existed
    Done,
}

impl JobStatus {
    /// Check if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Get the status name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Reserved => "reserved",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A job handed out by `reserve`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedJob {
    pub id: JobId,

    /// Opaque job body
    pub payload: Vec<u8>,

    /// Lease length in seconds
    pub ttr: u64,

    /// 1 on the first reservation, +1 on every redelivery
    pub attempt: u64,

    /// When the lease lapses and the job becomes eligible for redelivery
    pub lease_until: DateTime<Utc>,
}

impl ReservedJob {
    /// Check if the lease is still valid
    pub fn lease_valid(&self, now: DateTime<Utc>) -> bool {
        self.lease_until > now
    }

    /// Whether this is a redelivery of a previously abandoned lease
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }
}

/// Point-in-time counts for a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Ids sitting in lane lists, summed over all configured lanes
    pub waiting: u64,
    pub delayed: u64,
    pub reserved: u64,

    /// Jobs ever enqueued minus those still pending
    pub done: u64,

    /// Last id handed out by the counter
    pub last_id: u64,
}

impl QueueInfo {
    pub fn pending(&self) -> u64 {
        self.waiting + self.delayed + self.reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn only_done_is_terminal() {
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Waiting.is_terminal());
        assert!(!JobStatus::Reserved.is_terminal());
    }

    #[test]
    fn lease_validity_is_strict() {
        let until = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap();
        let job = ReservedJob {
            id: JobId::new(1).unwrap(),
            payload: Vec::new(),
            ttr: 10,
            attempt: 2,
            lease_until: until,
        };

        assert!(job.lease_valid(until - chrono::Duration::seconds(1)));
        assert!(!job.lease_valid(until));
        assert!(job.is_redelivery());
    }
}
