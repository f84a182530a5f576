//! # dog-delay-queue: priority delay queue over a shared store
//!
//! At-least-once job delivery with per-job time-to-run leases, delayed
//! visibility and ordered priority lanes. There is no broker process: every
//! piece of coordination state lives in a Redis-like store, and any number of
//! producers and consumers may work on the same channel at once.
//!
//! ## Lifecycle
//!
//! - `enqueue` writes the job and parks it in its lane, or in the delayed set
//! - `reserve` sweeps due jobs back into their lanes (at most once per lease
//!   ttl across all engines), then leases the next ready job
//! - `acknowledge` deletes a finished job; a lapsed lease makes it eligible
//!   for redelivery with `attempt + 1`
//! - `cancel` removes a job wherever it is
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dog_delay_queue::prelude::*;
//!
//! # async fn run() -> QueueResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let config = QueueConfig::new()
//!     .with_channel("mail")
//!     .with_lanes(["high", "low"]);
//! let queue = QueueEngine::new(store, config)?;
//!
//! let id = queue
//!     .enqueue(JobMessage::new("welcome:42").with_priority("high").with_ttr(Duration::from_secs(30)))
//!     .await?;
//!
//! if let Some(job) = queue.reserve(Duration::from_secs(5)).await? {
//!     // ... process job.payload ...
//!     queue.acknowledge(job.id).await?;
//! }
//! assert_eq!(queue.status(id).await?, JobStatus::Done);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod lease;
pub mod observability;
pub mod store;
pub mod types;

pub use adapter::JobQueue;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{DispatchOrder, LeaseConfig, QueueConfig};
pub use engine::QueueEngine;
pub use error::{QueueError, QueueResult};
pub use keys::ChannelKeys;
pub use lease::{LeaseGuard, MovingLease};
pub use observability::{BoxStream, LiveMetrics, MetricsSnapshot, ObservabilityLayer};
pub use store::{MemoryStore, QueueStore, WriteOp};
pub use types::{
    JobEvent, JobId, JobMessage, JobPriority, JobStatus, Lane, QueueInfo, ReservedJob, StoredMessage,
    SweepSource,
};

#[cfg(feature = "redis")]
pub use store::{RedisStore, RedisStoreConfig};

#[cfg(feature = "tracing-basic")]
pub use observability::{init_tracing, TracingFormat};

/// Everything a producer or worker harness usually needs
pub mod prelude {
    pub use crate::{
        JobId, JobMessage, JobPriority, JobQueue, JobStatus, Lane, MemoryStore, QueueConfig, QueueEngine,
        QueueError, QueueResult, QueueStore, ReservedJob, WriteOp,
    };

    #[cfg(feature = "redis")]
    pub use crate::{RedisStore, RedisStoreConfig};

    pub use async_trait::async_trait;
}
