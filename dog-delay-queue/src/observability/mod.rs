pub mod metrics;

#[cfg(feature = "tracing-basic")]
pub mod tracing;

use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::types::JobEvent;

pub use metrics::{LiveMetrics, MetricsSnapshot};

#[cfg(feature = "tracing-basic")]
pub use self::tracing::{init_tracing, TracingFormat};

/// Stream type handed to event subscribers
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

const EVENT_BUFFER: usize = 10_000;

/// Event fan-out plus live counters for one engine
///
/// Events are best-effort: a subscriber that falls more than the buffer
/// behind silently loses the oldest ones.
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<JobEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    /// Count the event and send it to every subscriber
    pub fn record(&self, event: JobEvent) {
        match &event {
            JobEvent::Enqueued { .. } => self.metrics.increment_jobs_enqueued(),
            JobEvent::Reserved { .. } => self.metrics.increment_jobs_reserved(),
            JobEvent::Requeued { .. } => self.metrics.increment_jobs_requeued(),
            JobEvent::Acknowledged { .. } => self.metrics.increment_jobs_acknowledged(),
            JobEvent::Canceled { .. } => self.metrics.increment_jobs_canceled(),
            JobEvent::Cleared { .. } => {}
        }
        // No subscribers is fine
        let _ = self.event_broadcaster.send(event);
    }

    /// A popped id was dropped because its message was gone
    pub fn record_skipped(&self) {
        self.metrics.increment_jobs_skipped();
    }

    pub fn metrics(&self) -> Arc<LiveMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Events recorded from now on; lagged events are dropped
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        let receiver = self.event_broadcaster.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|result| result.ok());
        Box::pin(stream)
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobId, Lane};
    use chrono::Utc;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn subscribers_see_recorded_events() {
        let layer = ObservabilityLayer::new();
        let mut events = layer.event_stream();
        let job_id = JobId::new(1).unwrap();

        layer.record(JobEvent::Enqueued {
            job_id,
            lane: Lane::from("normal"),
            ready_at: Utc::now(),
            at: Utc::now(),
        });
        layer.record(JobEvent::Acknowledged { job_id, at: Utc::now() });

        let first = events.next().await.unwrap();
        assert_eq!(first.event_name(), "enqueued");
        let second = events.next().await.unwrap();
        assert_eq!(second.event_name(), "acknowledged");

        let snap = layer.metrics().snapshot();
        assert_eq!(snap.enqueued, 1);
        assert_eq!(snap.acknowledged, 1);
    }

    #[test]
    fn recording_without_subscribers_still_counts() {
        let layer = ObservabilityLayer::new();
        layer.record(JobEvent::Canceled {
            job_id: JobId::new(3).unwrap(),
            at: Utc::now(),
        });
        layer.record_skipped();
        assert_eq!(layer.metrics().jobs_canceled(), 1);
        assert_eq!(layer.metrics().jobs_skipped(), 1);
    }
}
