use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{JobId, Lane};
use crate::{QueueError, QueueResult};

/// Job message - immutable submission data handed to `enqueue`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Opaque job body
    pub payload: Vec<u8>,

    /// Time-to-run; falls back to the channel default when unset
    pub ttr: Option<Duration>,

    /// How long the job stays invisible before it becomes ready
    pub delay: Duration,

    /// Target lane; falls back to the channel's default lane when unset
    pub priority: Option<Lane>,
}

impl JobMessage {
    /// Create a new job message
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ttr: None,
            delay: Duration::ZERO,
            priority: None,
        }
    }

    /// Set the time-to-run
    pub fn with_ttr(mut self, ttr: Duration) -> Self {
        self.ttr = Some(ttr);
        self
    }

    /// Set the visibility delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the target lane
    pub fn with_priority(mut self, lane: impl Into<Lane>) -> Self {
        self.priority = Some(lane.into());
        self
    }

    /// Whether the job must go through the delayed set
    ///
    /// Scores have whole-second resolution, so sub-second delays count as none.
    pub fn is_delayed(&self) -> bool {
        self.delay.as_secs() > 0
    }

    /// Get the payload size in bytes
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

/// Wire form of a Messages entry: `"{ttr};{payload}"`
///
/// The ttr is decimal seconds. The payload is everything after the first
/// `;`, so payloads may themselves contain semicolons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub ttr: u64,
    pub payload: Vec<u8>,
}

impl StoredMessage {
    const SEPARATOR: u8 = b';';

    pub fn new(ttr: u64, payload: Vec<u8>) -> Self {
        Self { ttr, payload }
    }

    pub fn encode(&self) -> Vec<u8> {
        let ttr = self.ttr.to_string();
        let mut out = Vec::with_capacity(ttr.len() + 1 + self.payload.len());
        out.extend_from_slice(ttr.as_bytes());
        out.push(Self::SEPARATOR);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(id: JobId, raw: &[u8]) -> QueueResult<Self> {
        let split = raw
            .iter()
            .position(|b| *b == Self::SEPARATOR)
            .ok_or_else(|| QueueError::malformed(id, "missing ttr separator"))?;

        let ttr = std::str::from_utf8(&raw[..split])
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| QueueError::malformed(id, "ttr is not a non-negative integer"))?;

        Ok(Self {
            ttr,
            payload: raw[split + 1..].to_vec(),
        })
    }
}
