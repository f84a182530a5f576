//! Moving lease: the short-lived, token-owned lock that serializes sweeps,
//! cancels and clears across every engine sharing a channel.
//!
//! The lock key self-expires after `LeaseConfig::ttl`, so a crashed holder
//! blocks others for at most that long. Release only deletes the key while it
//! still holds the caller's token.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LeaseConfig;
use crate::store::QueueStore;
use crate::{QueueError, QueueResult};

/// Proof of holding the moving lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseGuard(String);

impl LeaseGuard {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct MovingLease<S: QueueStore + ?Sized> {
    store: Arc<S>,
    key: String,
    config: LeaseConfig,
}

impl<S: QueueStore + ?Sized> MovingLease<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>, config: LeaseConfig) -> Self {
        Self {
            store,
            key: key.into(),
            config,
        }
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Single attempt; `None` when someone else holds the lease
    pub async fn try_acquire(&self) -> QueueResult<Option<LeaseGuard>> {
        let guard = LeaseGuard::generate();
        if self.store.set_nx_px(&self.key, guard.as_str(), self.config.ttl).await? {
            debug!(key = %self.key, "Moving lease acquired");
            Ok(Some(guard))
        } else {
            Ok(None)
        }
    }

    /// Retry with jittered exponential backoff until the lease is ours
    ///
    /// Fails with `LeaseTimeout` once `wait_limit` (if any) has passed.
    pub async fn acquire(&self) -> QueueResult<LeaseGuard> {
        let started = tokio::time::Instant::now();
        let mut attempt: u32 = 0;
        loop {
            if let Some(guard) = self.try_acquire().await? {
                return Ok(guard);
            }

            let mut delay = jittered(backoff_delay(
                attempt,
                self.config.initial_backoff,
                self.config.max_backoff,
            ));
            if let Some(limit) = self.config.wait_limit {
                let waited = started.elapsed();
                if waited >= limit {
                    warn!(key = %self.key, ?limit, attempts = attempt + 1, "Gave up waiting for moving lease");
                    return Err(QueueError::LeaseTimeout(limit));
                }
                delay = delay.min(limit - waited);
            }

            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Delete the lock if it still carries the guard's token
    ///
    /// Returns false when the lease had already expired or been taken over.
    pub async fn release(&self, guard: &LeaseGuard) -> QueueResult<bool> {
        let released = self.store.del_if_eq(&self.key, guard.as_str()).await?;
        if !released {
            debug!(key = %self.key, "Moving lease was no longer ours at release");
        }
        Ok(released)
    }
}

/// `initial * 2^attempt`, capped at `max`
fn backoff_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31));
    initial.saturating_mul(factor).min(max)
}

/// Uniform in `[delay / 2, delay]` so contending engines spread out
fn jittered(delay: Duration) -> Duration {
    let full = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
    if full < 2 {
        return delay;
    }
    let micros = rand::thread_rng().gen_range(full / 2..=full);
    Duration::from_micros(micros)
}
