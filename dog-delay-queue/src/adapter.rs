use std::time::Duration;

use async_trait::async_trait;

use crate::engine::QueueEngine;
use crate::store::QueueStore;
use crate::types::{JobId, JobMessage, JobStatus, QueueInfo, ReservedJob};
use crate::QueueResult;

/// What a worker harness or producer needs from a queue
///
/// Object safe, so harnesses can hold an `Arc<dyn JobQueue>` and stay
/// agnostic of the store behind it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, message: JobMessage) -> QueueResult<JobId>;

    /// `None` when nothing became ready within `timeout`
    async fn reserve(&self, timeout: Duration) -> QueueResult<Option<ReservedJob>>;

    async fn acknowledge(&self, id: JobId) -> QueueResult<()>;

    async fn cancel(&self, id: JobId) -> QueueResult<bool>;

    async fn status(&self, id: JobId) -> QueueResult<JobStatus>;

    /// Status for an id as received from the outside, e.g. an admin request
    ///
    /// Fails with `InvalidId` unless `raw` is a positive integer.
    async fn status_raw(&self, raw: &str) -> QueueResult<JobStatus> {
        let id = raw.parse::<JobId>()?;
        self.status(id).await
    }

    async fn clear_all(&self) -> QueueResult<u64>;

    async fn info(&self) -> QueueResult<QueueInfo>;
}

#[async_trait]
impl<S: QueueStore + ?Sized> JobQueue for QueueEngine<S> {
    async fn enqueue(&self, message: JobMessage) -> QueueResult<JobId> {
        QueueEngine::enqueue(self, message).await
    }

    async fn reserve(&self, timeout: Duration) -> QueueResult<Option<ReservedJob>> {
        QueueEngine::reserve(self, timeout).await
    }

    async fn acknowledge(&self, id: JobId) -> QueueResult<()> {
        QueueEngine::acknowledge(self, id).await
    }

    async fn cancel(&self, id: JobId) -> QueueResult<bool> {
        QueueEngine::cancel(self, id).await
    }

    async fn status(&self, id: JobId) -> QueueResult<JobStatus> {
        QueueEngine::status(self, id).await
    }

    async fn clear_all(&self) -> QueueResult<u64> {
        QueueEngine::clear_all(self).await
    }

    async fn info(&self) -> QueueResult<QueueInfo> {
        QueueEngine::info(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::store::MemoryStore;
    use crate::QueueError;
    use std::sync::Arc;

    fn queue() -> Arc<dyn JobQueue> {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryStore::new());
        Arc::new(QueueEngine::new(store, QueueConfig::new()).unwrap())
    }

    #[tokio::test]
    async fn works_through_a_trait_object() {
        let queue = queue();
        let id = queue.enqueue(JobMessage::new("ping")).await.unwrap();
        assert_eq!(queue.status(id).await.unwrap(), JobStatus::Waiting);

        let job = queue.reserve(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(queue.status(id).await.unwrap(), JobStatus::Reserved);

        queue.acknowledge(id).await.unwrap();
        assert_eq!(queue.status(id).await.unwrap(), JobStatus::Done);
    }

    #[tokio::test]
    async fn status_raw_validates_ids() {
        let queue = queue();
        for raw in ["0", "-3", "abc", ""] {
            let err = queue.status_raw(raw).await.unwrap_err();
            assert!(matches!(err, QueueError::InvalidId(_)), "{raw}");
        }
        assert_eq!(queue.status_raw("12").await.unwrap(), JobStatus::Done);
    }
}
