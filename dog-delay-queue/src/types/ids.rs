use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use crate::QueueError;

/// Unique identifier for a job
///
/// Ids come from the channel's `message_id` counter, start at 1 and are never
/// reused. Zero and negative values are rejected at construction, so every
/// `JobId` handed to the engine is already valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct JobId(NonZeroU64);

impl JobId {
    /// Create a job id from a raw counter value
    pub fn new(value: u64) -> Result<Self, QueueError> {
        NonZeroU64::new(value)
            .map(Self)
            .ok_or_else(|| QueueError::InvalidId(value.to_string()))
    }

    /// Get the numeric value
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Hash field / list member form used in the store
    pub fn as_field(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| QueueError::InvalidId(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<u64> for JobId {
    type Error = QueueError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for JobId {
    type Error = QueueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let value = u64::try_from(value).map_err(|_| QueueError::InvalidId(value.to_string()))?;
        Self::new(value)
    }
}

impl From<JobId> for u64 {
    fn from(id: JobId) -> Self {
        id.get()
    }
}
