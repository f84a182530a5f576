use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::config::{DispatchOrder, QueueConfig};
use crate::keys::ChannelKeys;
use crate::lease::MovingLease;
use crate::observability::{BoxStream, LiveMetrics, ObservabilityLayer};
use crate::store::{QueueStore, WriteOp};
use crate::types::{
    JobEvent, JobId, JobMessage, JobStatus, Lane, QueueInfo, ReservedJob, StoredMessage, SweepSource,
};
use crate::{QueueError, QueueResult};

/// Priority delay queue over a shared Redis-like store
///
/// Every piece of state lives in the store under the channel's key
/// namespace, so any number of engines (in any number of processes) may
/// operate on the same channel concurrently.
pub struct QueueEngine<S: QueueStore + ?Sized> {
    store: Arc<S>,
    config: QueueConfig,
    keys: ChannelKeys,
    clock: SharedClock,
    lease: MovingLease<S>,
    observability: Arc<ObservabilityLayer>,
}

impl<S: QueueStore + ?Sized> QueueEngine<S> {
    /// Create an engine for `config.channel` on `store`
    pub fn new(store: Arc<S>, config: QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        let keys = ChannelKeys::new(config.channel.clone());
        let lease = MovingLease::new(Arc::clone(&store), keys.moving_lock.clone(), config.lease.clone());
        info!(channel = %config.channel, lanes = ?config.lanes, "Queue engine ready");
        Ok(Self {
            store,
            config,
            keys,
            clock: Arc::new(SystemClock),
            lease,
            observability: Arc::new(ObservabilityLayer::new()),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Share an observability layer with other engines
    pub fn with_observability(mut self, observability: Arc<ObservabilityLayer>) -> Self {
        self.observability = observability;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn keys(&self) -> &ChannelKeys {
        &self.keys
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn observability(&self) -> Arc<ObservabilityLayer> {
        Arc::clone(&self.observability)
    }

    pub fn metrics(&self) -> Arc<LiveMetrics> {
        self.observability.metrics()
    }

    /// Events recorded by this engine from now on
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        self.observability.event_stream()
    }

    /// Write a new job and return its id
    ///
    /// A job with a delay of at least one second goes to the delayed set;
    /// anything else is ready immediately. The ttr is rounded up to whole
    /// seconds, at least one. The message, its lane and its placement are
    /// written in one batch once the id is allocated.
    #[instrument(skip(self, message), fields(channel = %self.keys.channel(), size = message.payload_size()))]
    pub async fn enqueue(&self, message: JobMessage) -> QueueResult<JobId> {
        let lane = message
            .priority
            .clone()
            .unwrap_or_else(|| Lane::new(self.config.default_lane.clone()));
        if !self.config.has_lane(lane.as_str()) {
            return Err(QueueError::UnsupportedPriority(lane.to_string()));
        }
        let ttr = whole_secs_at_least_one(message.ttr.unwrap_or(self.config.default_ttr));
        let delay = message.is_delayed().then_some(message.delay.as_secs());

        let raw_id = self.store.incr(&self.keys.message_id).await?;
        let id = JobId::try_from(raw_id)
            .map_err(|_| QueueError::Internal(format!("id counter returned {}", raw_id)))?;
        let field = id.as_field();

        let now = self.clock.now();
        let (placement, ready_at) = match delay {
            Some(delay) => {
                let score = now.timestamp().saturating_add(secs_i64(delay));
                (WriteOp::zadd(&self.keys.delayed, &field, score), timestamp_to_datetime(score))
            }
            None => {
                let waiting = self.keys.waiting(lane.as_str());
                let push = match self.config.dispatch_order {
                    DispatchOrder::Lifo => WriteOp::rpush(&waiting, &field),
                    DispatchOrder::Fifo => WriteOp::lpush(&waiting, &field),
                };
                (push, now)
            }
        };

        let stored = StoredMessage::new(ttr, message.payload);
        self.store
            .batch(&[
                WriteOp::hset(&self.keys.messages, &field, stored.encode()),
                WriteOp::hset(&self.keys.priority, &field, lane.as_str()),
                placement,
            ])
            .await?;

        info!(job_id = %id, lane = %lane, ttr, "Job enqueued");
        self.observability.record(JobEvent::Enqueued {
            job_id: id,
            lane,
            ready_at,
            at: now,
        });
        Ok(id)
    }

    /// Lease the next ready job, waiting up to `timeout` for one
    ///
    /// Runs a sweep first when the moving lease is free. Lanes are tried in
    /// configured order; a zero timeout polls each lane once.
    #[instrument(skip(self), fields(channel = %self.keys.channel()))]
    pub async fn reserve(&self, timeout: Duration) -> QueueResult<Option<ReservedJob>> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout).unwrap_or(started + MAX_WAIT);

        // The lease is left to expire so sweeps run at most once per ttl
        if self.lease.try_acquire().await?.is_some() {
            self.sweep(SweepSource::Delayed).await?;
            self.sweep(SweepSource::Reserved).await?;
        }

        loop {
            let Some(raw) = self.pop_ready(deadline).await? else {
                debug!("No ready job");
                return Ok(None);
            };
            let id = match raw.parse::<JobId>() {
                Ok(id) => id,
                Err(_) => {
                    warn!(raw = %raw, "Dropped unparseable id from waiting list");
                    self.observability.record_skipped();
                    continue;
                }
            };
            if let Some(job) = self.lease_job(id).await? {
                return Ok(Some(job));
            }
        }
    }

    /// Non-blocking pass over the lanes, then one blocking pop over all of
    /// them bounded by `deadline`
    async fn pop_ready(&self, deadline: Instant) -> QueueResult<Option<String>> {
        for lane in &self.config.lanes {
            if let Some(raw) = self.store.rpop(&self.keys.waiting(lane)).await? {
                return Ok(Some(raw));
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        let lane_keys: Vec<String> = self
            .config
            .lanes
            .iter()
            .map(|lane| self.keys.waiting(lane))
            .collect();
        let popped = self.store.brpop(&lane_keys, remaining).await?;
        Ok(popped.map(|(_, raw)| raw))
    }

    /// Move a popped id into the reserved set; `None` if its message is gone
    async fn lease_job(&self, id: JobId) -> QueueResult<Option<ReservedJob>> {
        let field = id.as_field();

        let Some(raw) = self.store.hget(&self.keys.messages, &field).await? else {
            warn!(job_id = %id, "Popped job has no message, skipping");
            self.store.hdel(&self.keys.attempts, &field).await?;
            self.observability.record_skipped();
            return Ok(None);
        };
        let stored = match StoredMessage::decode(id, &raw) {
            Ok(stored) => stored,
            Err(e) => {
                // Already out of its lane, so it must leave every table
                warn!(job_id = %id, error = %e, "Dropped malformed job");
                self.store
                    .batch(&[
                        WriteOp::hdel(&self.keys.messages, &field),
                        WriteOp::hdel(&self.keys.priority, &field),
                        WriteOp::hdel(&self.keys.attempts, &field),
                    ])
                    .await?;
                self.observability.record_skipped();
                return Ok(None);
            }
        };

        let now = self.clock.now();
        let score = now.timestamp().saturating_add(secs_i64(stored.ttr));
        let replies = self
            .store
            .batch(&[
                WriteOp::zadd(&self.keys.reserved, &field, score),
                WriteOp::hincrby(&self.keys.attempts, &field, 1),
            ])
            .await?;
        let attempt = reply(&replies, 1)?;

        // A cancel may have slipped in between the pop and the zadd
        if !self.store.hexists(&self.keys.messages, &field).await? {
            warn!(job_id = %id, "Job vanished while being reserved, rolling back");
            self.store
                .batch(&[
                    WriteOp::zrem(&self.keys.reserved, &field),
                    WriteOp::hdel(&self.keys.attempts, &field),
                ])
                .await?;
            self.observability.record_skipped();
            return Ok(None);
        }

        let attempt = u64::try_from(attempt)
            .map_err(|_| QueueError::Internal(format!("attempt count for {} is {}", id, attempt)))?;
        let lease_until = timestamp_to_datetime(score);

        debug!(job_id = %id, attempt, %lease_until, "Job reserved");
        self.observability.record(JobEvent::Reserved {
            job_id: id,
            attempt,
            lease_until,
            at: now,
        });
        Ok(Some(ReservedJob {
            id,
            payload: stored.payload,
            ttr: stored.ttr,
            attempt,
            lease_until,
        }))
    }

    /// Move every due id of `source` to the far end of its lane
    ///
    /// Only ids this call removed from the set are requeued, so overlapping
    /// sweeps never push the same id twice.
    async fn sweep(&self, source: SweepSource) -> QueueResult<u64> {
        let set = match source {
            SweepSource::Delayed => &self.keys.delayed,
            SweepSource::Reserved => &self.keys.reserved,
        };
        let now = self.clock.now();
        let due = self.store.zrange_by_score(set, now.timestamp()).await?;

        let mut moved = 0;
        for field in due {
            if !self.store.zrem(set, &field).await? {
                continue;
            }
            let Some(raw_lane) = self.store.hget(&self.keys.priority, &field).await? else {
                warn!(job_id = %field, ?source, "Swept job has no priority entry, dropping");
                self.store.hdel(&self.keys.attempts, &field).await?;
                continue;
            };
            let lane = Lane::new(String::from_utf8_lossy(&raw_lane).into_owned());
            self.store.lpush(&self.keys.waiting(lane.as_str()), &field).await?;
            moved += 1;

            match field.parse::<JobId>() {
                Ok(job_id) => {
                    debug!(%job_id, lane = %lane, ?source, "Job requeued");
                    self.observability.record(JobEvent::Requeued {
                        job_id,
                        lane,
                        from: source,
                        at: now,
                    });
                }
                Err(_) => warn!(raw = %field, "Requeued an id that is not a job id"),
            }
        }

        if moved > 0 {
            debug!(?source, moved, "Sweep finished");
        }
        Ok(moved)
    }

    /// Delete a finished job from every table in one batch
    ///
    /// Acknowledging an id that is already gone does nothing.
    #[instrument(skip(self), fields(channel = %self.keys.channel()))]
    pub async fn acknowledge(&self, id: JobId) -> QueueResult<()> {
        let field = id.as_field();
        let replies = self
            .store
            .batch(&[
                WriteOp::zrem(&self.keys.reserved, &field),
                WriteOp::hdel(&self.keys.attempts, &field),
                WriteOp::hdel(&self.keys.messages, &field),
                WriteOp::hdel(&self.keys.priority, &field),
            ])
            .await?;
        let existed = reply(&replies, 2)? > 0;

        if existed {
            debug!(job_id = %id, "Job acknowledged");
            self.observability.record(JobEvent::Acknowledged {
                job_id: id,
                at: self.clock.now(),
            });
        }
        Ok(())
    }

    /// Remove a job wherever it is; false when it no longer exists
    ///
    /// Waits for the moving lease so no sweep can relocate the job mid-way.
    #[instrument(skip(self), fields(channel = %self.keys.channel()))]
    pub async fn cancel(&self, id: JobId) -> QueueResult<bool> {
        let guard = self.lease.acquire().await?;
        let result = self.cancel_locked(id).await;
        if let Err(e) = self.lease.release(&guard).await {
            warn!(error = %e, "Failed to release moving lease after cancel");
        }

        let canceled = result?;
        if canceled {
            info!(job_id = %id, "Job canceled");
            self.observability.record(JobEvent::Canceled {
                job_id: id,
                at: self.clock.now(),
            });
        }
        Ok(canceled)
    }

    /// Reads the lane, then removes the job from every table in one batch
    async fn cancel_locked(&self, id: JobId) -> QueueResult<bool> {
        let field = id.as_field();
        let lane = self.store.hget(&self.keys.priority, &field).await?;

        let mut ops = vec![
            WriteOp::hdel(&self.keys.messages, &field),
            WriteOp::zrem(&self.keys.delayed, &field),
            WriteOp::zrem(&self.keys.reserved, &field),
        ];
        if let Some(raw_lane) = lane {
            let lane = String::from_utf8_lossy(&raw_lane);
            ops.push(WriteOp::lrem(&self.keys.waiting(&lane), &field));
        }
        ops.push(WriteOp::hdel(&self.keys.attempts, &field));
        ops.push(WriteOp::hdel(&self.keys.priority, &field));

        let replies = self.store.batch(&ops).await?;
        Ok(reply(&replies, 0)? > 0)
    }

    /// Where the job currently is
    ///
    /// A job whose lease lapsed but has not been swept yet still reports
    /// `Reserved`.
    #[instrument(skip(self), fields(channel = %self.keys.channel()))]
    pub async fn status(&self, id: JobId) -> QueueResult<JobStatus> {
        let field = id.as_field();
        if self.store.hexists(&self.keys.attempts, &field).await? {
            Ok(JobStatus::Reserved)
        } else if self.store.hexists(&self.keys.messages, &field).await? {
            Ok(JobStatus::Waiting)
        } else {
            Ok(JobStatus::Done)
        }
    }

    /// Delete every key of the channel, returning how many were removed
    ///
    /// Destructive; meant for tests and resets.
    #[instrument(skip(self), fields(channel = %self.keys.channel()))]
    pub async fn clear_all(&self) -> QueueResult<u64> {
        let guard = self.lease.acquire().await?;
        let result = self.delete_channel_keys().await;
        if result.is_err() {
            if let Err(e) = self.lease.release(&guard).await {
                warn!(error = %e, "Failed to release moving lease after clear");
            }
        }

        // The moving lock is one of the deleted keys
        let removed = result?;
        info!(removed, "Channel cleared");
        self.observability.record(JobEvent::Cleared {
            channel: self.keys.channel().to_string(),
            keys: removed,
            at: self.clock.now(),
        });
        Ok(removed)
    }

    async fn delete_channel_keys(&self) -> QueueResult<u64> {
        let mut owned = vec![
            self.keys.message_id.clone(),
            self.keys.messages.clone(),
            self.keys.priority.clone(),
            self.keys.delayed.clone(),
            self.keys.reserved.clone(),
            self.keys.attempts.clone(),
            self.keys.moving_lock.clone(),
        ];
        owned.extend(self.config.lanes.iter().map(|lane| self.keys.waiting(lane)));

        // A channel named `{channel}.waiting` shares our prefix, so only
        // exact key names count as ours
        let keys: Vec<String> = self
            .store
            .scan_prefix(&self.keys.prefix())
            .await?
            .into_iter()
            .filter(|key| owned.contains(key))
            .collect();
        self.store.del(&keys).await
    }

    /// Point-in-time counts for the channel
    #[instrument(skip(self), fields(channel = %self.keys.channel()))]
    pub async fn info(&self) -> QueueResult<QueueInfo> {
        let mut waiting = 0;
        for lane in &self.config.lanes {
            waiting += self.store.llen(&self.keys.waiting(lane)).await?;
        }
        let delayed = self.store.zcard(&self.keys.delayed).await?;
        let reserved = self.store.zcard(&self.keys.reserved).await?;

        let last_id = match self.store.get(&self.keys.message_id).await? {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| QueueError::Internal(format!("id counter holds {:?}", raw)))?,
            None => 0,
        };

        Ok(QueueInfo {
            waiting,
            delayed,
            reserved,
            done: last_id.saturating_sub(waiting + delayed + reserved),
            last_id,
        })
    }
}

/// Cap for absurd reserve timeouts that would overflow an `Instant`
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn whole_secs_at_least_one(duration: Duration) -> u64 {
    let secs = duration.as_secs().saturating_add(u64::from(duration.subsec_nanos() > 0));
    secs.max(1)
}

/// Integer reply `index` of a batch
fn reply(replies: &[i64], index: usize) -> QueueResult<i64> {
    replies
        .get(index)
        .copied()
        .ok_or_else(|| QueueError::Internal(format!("batch returned {} replies, wanted #{}", replies.len(), index)))
}

fn secs_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use tracing_test::traced_test;

    struct Fixture {
        engine: QueueEngine<MemoryStore>,
        store: Arc<MemoryStore>,
        clock: ManualClock,
    }

    fn fixture(config: QueueConfig) -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
        let engine = QueueEngine::new(Arc::clone(&store), config)
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        Fixture { engine, store, clock }
    }

    #[test]
    fn rejects_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let config = QueueConfig::new().with_default_lane("missing");
        let err = QueueEngine::new(store, config).err().unwrap();
        assert!(matches!(err, QueueError::Configuration(_)));
    }

    #[tokio::test]
    async fn enqueue_writes_message_and_priority() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let id = f
            .engine
            .enqueue(JobMessage::new("hello").with_ttr(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(id.get(), 1);
        let raw = f.store.hget("q.messages", "1").await.unwrap().unwrap();
        assert_eq!(raw, b"5;hello".to_vec());
        let lane = f.store.hget("q.priority", "1").await.unwrap().unwrap();
        assert_eq!(lane, b"normal".to_vec());
        assert_eq!(f.store.list_members("q.waiting.normal"), vec!["1"]);
    }

    #[tokio::test]
    async fn unsupported_lane_writes_nothing() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let err = f
            .engine
            .enqueue(JobMessage::new("x").with_priority("urgent"))
            .await
            .unwrap_err();

        assert_eq!(err, QueueError::UnsupportedPriority("urgent".to_string()));
        assert!(f.store.scan_prefix("q.").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delayed_job_is_scored_at_ready_time() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        f.engine
            .enqueue(JobMessage::new("later").with_delay(Duration::from_secs(30)))
            .await
            .unwrap();

        let start = f.clock.unix_secs();
        assert_eq!(f.store.zset_members("q.delayed"), vec![("1".to_string(), start + 30)]);
        assert!(f.store.list_members("q.waiting.normal").is_empty());
    }

    #[tokio::test]
    async fn sweep_drops_ids_without_priority() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let now = f.clock.unix_secs();
        f.store.zadd("q.reserved", "9", now).await.unwrap();
        f.store.hset("q.attempts", "9", b"1").await.unwrap();

        let moved = f.engine.sweep(SweepSource::Reserved).await.unwrap();

        assert_eq!(moved, 0);
        assert_eq!(f.store.zcard("q.reserved").await.unwrap(), 0);
        assert!(!f.store.hexists("q.attempts", "9").await.unwrap());
    }

    #[tokio::test]
    async fn sweep_leaves_future_entries_alone() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let now = f.clock.unix_secs();
        for (id, score) in [("1", now - 5), ("2", now), ("3", now + 1)] {
            f.store.zadd("q.delayed", id, score).await.unwrap();
            f.store.hset("q.priority", id, b"high").await.unwrap();
        }

        let moved = f.engine.sweep(SweepSource::Delayed).await.unwrap();

        assert_eq!(moved, 2);
        assert_eq!(f.store.list_members("q.waiting.high"), vec!["2", "1"]);
        assert_eq!(f.store.zset_members("q.delayed"), vec![("3".to_string(), now + 1)]);
    }

    #[tokio::test]
    #[traced_test]
    async fn vanished_message_is_skipped_with_a_warning() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        f.store.rpush("q.waiting.normal", "8").await.unwrap();
        f.store.hset("q.attempts", "8", b"2").await.unwrap();

        assert!(f.engine.reserve(Duration::ZERO).await.unwrap().is_none());
        assert!(!f.store.hexists("q.attempts", "8").await.unwrap());
        assert_eq!(f.engine.metrics().jobs_skipped(), 1);
        assert!(logs_contain("Popped job has no message"));
    }

    #[tokio::test]
    #[traced_test]
    async fn cancel_logs_and_emits_event() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let id = f.engine.enqueue(JobMessage::new("x")).await.unwrap();

        assert!(f.engine.cancel(id).await.unwrap());
        assert!(logs_contain("Job canceled"));
        assert_eq!(f.engine.metrics().jobs_canceled(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn malformed_message_is_dropped_and_dispatch_continues() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let good = f.engine.enqueue(JobMessage::new("fine")).await.unwrap();
        f.store.hset("q.messages", "40", b"no separator").await.unwrap();
        f.store.hset("q.priority", "40", b"normal").await.unwrap();
        f.store.rpush("q.waiting.normal", "40").await.unwrap();

        let job = f.engine.reserve(Duration::ZERO).await.unwrap().unwrap();

        assert_eq!(job.id, good);
        assert_eq!(f.store.hash_fields("q.messages"), vec![good.as_field()]);
        assert_eq!(f.store.hash_fields("q.priority"), vec![good.as_field()]);
        assert_eq!(f.store.hash_fields("q.attempts"), vec![good.as_field()]);
        assert_eq!(f.engine.status(JobId::new(40).unwrap()).await.unwrap(), JobStatus::Done);
        assert_eq!(f.engine.metrics().jobs_skipped(), 1);
        assert!(logs_contain("Dropped malformed job"));
    }

    #[tokio::test]
    async fn sub_second_ttr_rounds_up() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        for (id, ttr) in [(1, Duration::from_millis(500)), (2, Duration::ZERO), (3, Duration::from_millis(2001))] {
            f.engine.enqueue(JobMessage::new("x").with_ttr(ttr)).await.unwrap();
            let stored = f.store.hget("q.messages", &id.to_string()).await.unwrap().unwrap();
            let expected = if id == 3 { b"3;x".to_vec() } else { b"1;x".to_vec() };
            assert_eq!(stored, expected);
        }

        let job = f.engine.reserve(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.ttr, 3);
        let job = f.engine.reserve(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.lease_until, f.clock.now() + chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn info_counts_every_table() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        for _ in 0..3 {
            f.engine.enqueue(JobMessage::new("ready")).await.unwrap();
        }
        f.engine
            .enqueue(JobMessage::new("later").with_delay(Duration::from_secs(60)))
            .await
            .unwrap();
        let job = f.engine.reserve(Duration::ZERO).await.unwrap().unwrap();
        f.engine.acknowledge(job.id).await.unwrap();
        f.engine.reserve(Duration::ZERO).await.unwrap().unwrap();

        let info = f.engine.info().await.unwrap();
        assert_eq!(
            info,
            QueueInfo {
                waiting: 1,
                delayed: 1,
                reserved: 1,
                done: 1,
                last_id: 4,
            }
        );
    }

    #[tokio::test]
    async fn clear_all_spares_channels_sharing_the_prefix() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        f.engine.enqueue(JobMessage::new("mine")).await.unwrap();
        f.store.incr("q.x.message_id").await.unwrap();

        let removed = f.engine.clear_all().await.unwrap();

        assert_eq!(removed, 5);
        assert_eq!(
            f.store.scan_prefix("q.").await.unwrap(),
            vec!["q.x.message_id".to_string()]
        );
    }

    #[tokio::test]
    async fn clear_all_spares_a_channel_named_like_its_waiting_lists() {
        let f = fixture(QueueConfig::new().with_channel("q"));
        let sibling = QueueEngine::new(Arc::clone(&f.store), QueueConfig::new().with_channel("q.waiting"))
            .unwrap()
            .with_clock(Arc::new(f.clock.clone()));
        f.engine.enqueue(JobMessage::new("mine")).await.unwrap();
        let theirs = sibling.enqueue(JobMessage::new("theirs")).await.unwrap();

        f.engine.clear_all().await.unwrap();

        assert_eq!(sibling.status(theirs).await.unwrap(), JobStatus::Waiting);
        assert_eq!(
            f.store.scan_prefix("q.").await.unwrap(),
            vec!["q.waiting.message_id", "q.waiting.messages", "q.waiting.priority", "q.waiting.waiting.normal"]
        );
        let job = sibling.reserve(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.payload, b"theirs".to_vec());
    }
}
