//! Topic-based event fan-out.
//!
//! Two topic classes: one global topic that receives every event, and one
//! topic per job id. Per-job topics are created lazily on first subscribe
//! and dropped with the job record. Delivery is at-least-once to each
//! currently-subscribed observer; a receiver that lags past the channel
//! capacity is disconnected and must resubscribe for a fresh snapshot.

use std::collections::HashMap;

use tokio::sync::broadcast;
use tracing::debug;

use mediaq_models::{JobEvent, JobId};

const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Publish/subscribe fabric for job events.
pub struct EventBroadcaster {
    global: broadcast::Sender<JobEvent>,
    topics: tokio::sync::RwLock<HashMap<JobId, broadcast::Sender<JobEvent>>>,
    capacity: usize,
}

impl EventBroadcaster {
    /// Create a broadcaster with the default per-topic capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a broadcaster with an explicit per-topic capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (global, _) = broadcast::channel(capacity);
        Self {
            global,
            topics: tokio::sync::RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Publish an event to the global topic and, for job-scoped events,
    /// to the job's topic if anyone created it.
    pub async fn publish(&self, event: JobEvent) {
        if let Some(job_id) = event.job_id() {
            let topics = self.topics.read().await;
            if let Some(sender) = topics.get(job_id) {
                // Send fails only when there are no receivers; that is fine.
                let _ = sender.send(event.clone());
            }
        }
        let _ = self.global.send(event);
    }

    /// Subscribe to the global topic.
    pub fn subscribe_global(&self) -> broadcast::Receiver<JobEvent> {
        self.global.subscribe()
    }

    /// Subscribe to a job's topic, creating it if needed.
    pub async fn subscribe_job(&self, job_id: &JobId) -> broadcast::Receiver<JobEvent> {
        let mut topics = self.topics.write().await;
        topics
            .entry(job_id.clone())
            .or_insert_with(|| {
                debug!(job_id = %job_id, "Creating job topic");
                broadcast::channel(self.capacity).0
            })
            .subscribe()
    }

    /// Drop a job's topic. Existing receivers see the stream close.
    pub async fn drop_topic(&self, job_id: &JobId) {
        if self.topics.write().await.remove(job_id).is_some() {
            debug!(job_id = %job_id, "Dropped job topic");
        }
    }

    /// Number of live subscribers on the global topic.
    pub fn global_subscriber_count(&self) -> usize {
        self.global.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaq_models::{ExecutionMode, Job, JobEventType};

    #[tokio::test]
    async fn test_global_receives_all_events() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe_global();

        let a = Job::new("a.mp4", 1, ExecutionMode::Local);
        let b = Job::new("b.mp4", 1, ExecutionMode::Local);
        broadcaster.publish(JobEvent::created(a)).await;
        broadcaster.publish(JobEvent::created(b)).await;

        assert_eq!(rx.recv().await.unwrap().event_type(), JobEventType::Created);
        assert_eq!(rx.recv().await.unwrap().event_type(), JobEventType::Created);
    }

    #[tokio::test]
    async fn test_job_topic_filters_by_id() {
        let broadcaster = EventBroadcaster::new();

        let a = Job::new("a.mp4", 1, ExecutionMode::Local);
        let b = Job::new("b.mp4", 1, ExecutionMode::Local);
        let mut rx = broadcaster.subscribe_job(&a.id).await;

        broadcaster.publish(JobEvent::created(b)).await;
        broadcaster.publish(JobEvent::created(a.clone())).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), Some(&a.id));
    }

    #[tokio::test]
    async fn test_drop_topic_closes_receivers() {
        let broadcaster = EventBroadcaster::new();
        let job = Job::new("a.mp4", 1, ExecutionMode::Local);
        let mut rx = broadcaster.subscribe_job(&job.id).await;

        broadcaster.drop_topic(&job.id).await;
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broadcaster = EventBroadcaster::new();
        let job = Job::new("a.mp4", 1, ExecutionMode::Local);
        broadcaster.publish(JobEvent::created(job)).await;
    }
}
