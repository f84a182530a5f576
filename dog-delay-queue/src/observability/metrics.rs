use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for queue operations on one engine
#[derive(Debug, Default)]
pub struct LiveMetrics {
    jobs_enqueued: AtomicU64,
    jobs_reserved: AtomicU64,
    jobs_acknowledged: AtomicU64,
    jobs_canceled: AtomicU64,
    jobs_requeued: AtomicU64,
    jobs_skipped: AtomicU64,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_jobs_enqueued(&self) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_reserved(&self) {
        self.jobs_reserved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_acknowledged(&self) {
        self.jobs_acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_canceled(&self) {
        self.jobs_canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_requeued(&self) {
        self.jobs_requeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Popped ids dropped because their message was gone
    pub fn increment_jobs_skipped(&self) {
        self.jobs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn jobs_enqueued(&self) -> u64 {
        self.jobs_enqueued.load(Ordering::Relaxed)
    }

    pub fn jobs_reserved(&self) -> u64 {
        self.jobs_reserved.load(Ordering::Relaxed)
    }

    pub fn jobs_acknowledged(&self) -> u64 {
        self.jobs_acknowledged.load(Ordering::Relaxed)
    }

    pub fn jobs_canceled(&self) -> u64 {
        self.jobs_canceled.load(Ordering::Relaxed)
    }

    pub fn jobs_requeued(&self) -> u64 {
        self.jobs_requeued.load(Ordering::Relaxed)
    }

    pub fn jobs_skipped(&self) -> u64 {
        self.jobs_skipped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.jobs_enqueued(),
            reserved: self.jobs_reserved(),
            acknowledged: self.jobs_acknowledged(),
            canceled: self.jobs_canceled(),
            requeued: self.jobs_requeued(),
            skipped: self.jobs_skipped(),
        }
    }
}

/// Plain copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub reserved: u64,
    pub acknowledged: u64,
    pub canceled: u64,
    pub requeued: u64,
    pub skipped: u64,
}
