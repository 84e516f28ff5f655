//! Authoritative in-memory job store.
//!
//! Records are held behind a per-record mutex, so all mutations for one
//! job id are serialized without a process-wide write lock. Events are
//! published while the record lock is held, which is what gives
//! subscribers FIFO ordering per job.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use mediaq_models::{Job, JobEvent, JobId, JobResult, JobStatus, StatusCounts};

use crate::broadcast::EventBroadcaster;
use crate::error::{RegistryError, RegistryResult};

/// Single source of truth for job status and progress.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
    broadcaster: Arc<EventBroadcaster>,
}

impl JobRegistry {
    /// Create a registry publishing through the given broadcaster.
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    /// The broadcaster events are published through.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Insert a new job record and publish a `created` event.
    ///
    /// Fails if a record with the same id already exists.
    pub async fn create(&self, job: Job) -> RegistryResult<Job> {
        let id = job.id.clone();
        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&id) {
                return Err(RegistryError::AlreadyExists(id));
            }
            jobs.insert(id.clone(), Arc::new(Mutex::new(job.clone())));
        }

        info!(job_id = %id, name = %job.original_name, mode = %job.mode.as_str(), "Job created");
        self.broadcaster.publish(JobEvent::created(job.clone())).await;
        Ok(job)
    }

    /// Merge status/progress/error into an existing record and publish an
    /// `updated` event.
    ///
    /// Unknown ids and transitions out of a terminal state are logged
    /// no-ops returning `None`; they never raise to the caller.
    pub async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: Option<u8>,
        error_message: Option<String>,
    ) -> Option<Job> {
        let record = match self.record(id).await {
            Some(r) => r,
            None => {
                warn!(job_id = %id, "Update for unknown job ignored");
                return None;
            }
        };

        let mut job = record.lock().await;
        if job.is_terminal() {
            warn!(
                job_id = %id,
                current = %job.status,
                attempted = %status,
                "Update after terminal state ignored"
            );
            return None;
        }

        match status {
            JobStatus::Uploaded => {
                // Initial state only; never a forward transition.
                warn!(
                    job_id = %id,
                    current = %job.status,
                    "Status regression to uploaded ignored"
                );
                return None;
            }
            JobStatus::Processing => {
                let p = progress.unwrap_or(job.progress);
                job.start(p);
            }
            JobStatus::Error => {
                if let Some(p) = progress {
                    job.set_progress(p);
                }
                job.fail(error_message.clone().unwrap_or_else(|| "unknown error".into()));
            }
            JobStatus::Completed => {
                // Completion must attach a result; route through update_result.
                warn!(job_id = %id, "update_status(completed) ignored, use update_result");
                return None;
            }
        }

        let snapshot = job.clone();
        debug!(job_id = %id, status = %snapshot.status, progress = snapshot.progress, "Job updated");
        // Published under the record lock to keep per-job FIFO ordering.
        self.broadcaster.publish(JobEvent::updated(snapshot.clone())).await;
        Some(snapshot)
    }

    /// Mark a job completed at progress 100 with its result attached and
    /// publish a distinguished `completed` event.
    pub async fn update_result(&self, id: &JobId, result: JobResult) -> Option<Job> {
        let record = match self.record(id).await {
            Some(r) => r,
            None => {
                warn!(job_id = %id, "Result for unknown job ignored");
                return None;
            }
        };

        let mut job = record.lock().await;
        if job.is_terminal() {
            warn!(job_id = %id, current = %job.status, "Result after terminal state ignored");
            return None;
        }

        job.complete(result);
        let snapshot = job.clone();
        info!(job_id = %id, "Job completed");
        self.broadcaster.publish(JobEvent::completed(snapshot.clone())).await;
        Some(snapshot)
    }

    /// Read a job snapshot.
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        let record = self.record(id).await?;
        let job = record.lock().await;
        Some(job.clone())
    }

    /// Snapshot all jobs.
    pub async fn list(&self) -> Vec<Job> {
        let records: Vec<_> = self.jobs.read().await.values().cloned().collect();
        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            jobs.push(record.lock().await.clone());
        }
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Snapshot all jobs with the given status.
    pub async fn list_by_status(&self, status: JobStatus) -> Vec<Job> {
        let mut jobs = self.list().await;
        jobs.retain(|j| j.status == status);
        jobs
    }

    /// Remove a record, drop its topic and publish a `removed` event.
    ///
    /// Explicit housekeeping only; completion never removes a job.
    pub async fn remove(&self, id: &JobId) -> Option<Job> {
        let record = self.jobs.write().await.remove(id)?;
        let job = record.lock().await.clone();

        info!(job_id = %id, "Job removed");
        self.broadcaster.publish(JobEvent::removed(id.clone())).await;
        self.broadcaster.drop_topic(id).await;
        Some(job)
    }

    /// Aggregate counts by status.
    pub async fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in self.list().await {
            counts.record(job.status);
        }
        counts
    }

    /// Subscribe to one job: returns the current snapshot together with a
    /// receiver positioned after it.
    ///
    /// Taken under the record lock, so no update can slip between the
    /// snapshot and the first delta.
    pub async fn subscribe_job(
        &self,
        id: &JobId,
    ) -> RegistryResult<(Job, broadcast::Receiver<JobEvent>)> {
        let record = self
            .record(id)
            .await
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        let job = record.lock().await;
        let rx = self.broadcaster.subscribe_job(id).await;
        Ok((job.clone(), rx))
    }

    /// Subscribe to the global topic with a snapshot of every job.
    pub async fn subscribe_all(&self) -> (Vec<Job>, broadcast::Receiver<JobEvent>) {
        // Receiver first: anything published between these two calls shows
        // up both in the snapshot and the stream, which at-least-once allows.
        let rx = self.broadcaster.subscribe_global();
        let jobs = self.list().await;
        (jobs, rx)
    }

    async fn record(&self, id: &JobId) -> Option<Arc<Mutex<Job>>> {
        self.jobs.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaq_models::{ExecutionMode, JobEventType};

    fn registry() -> JobRegistry {
        JobRegistry::new(Arc::new(EventBroadcaster::new()))
    }

    fn new_job() -> Job {
        Job::new("clip.mp4", 2048, ExecutionMode::Local)
    }

    fn result() -> JobResult {
        JobResult {
            primary_url: Some("https://cdn.example/out.mp4".into()),
            thumbnail_url: "https://cdn.example/thumb.jpg".into(),
            part_urls: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();

        let found = registry.get(&job.id).await.unwrap();
        assert_eq!(found.status, JobStatus::Uploaded);
        assert_eq!(found.progress, 0);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();

        let duplicate = registry.create(job.clone()).await;
        assert!(matches!(duplicate, Err(RegistryError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let registry = registry();
        let missing = JobId::new();
        let updated = registry
            .update_status(&missing, JobStatus::Processing, Some(10), None)
            .await;
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_terminal_state_absorbs_updates() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();

        registry
            .update_status(&job.id, JobStatus::Processing, Some(20), None)
            .await
            .unwrap();
        registry
            .update_status(&job.id, JobStatus::Error, None, Some("codec error".into()))
            .await
            .unwrap();

        // Further updates are ignored, final state stands
        let late = registry
            .update_status(&job.id, JobStatus::Processing, Some(90), None)
            .await;
        assert!(late.is_none());
        let late_result = registry.update_result(&job.id, result()).await;
        assert!(late_result.is_none());

        let found = registry.get(&job.id).await.unwrap();
        assert_eq!(found.status, JobStatus::Error);
        assert_eq!(found.progress, 20);
        assert_eq!(found.error_message.as_deref(), Some("codec error"));
    }

    #[tokio::test]
    async fn test_status_regression_to_uploaded_ignored() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();
        registry
            .update_status(&job.id, JobStatus::Processing, Some(40), None)
            .await
            .unwrap();

        let regressed = registry
            .update_status(&job.id, JobStatus::Uploaded, None, None)
            .await;
        assert!(regressed.is_none());

        let stored = registry.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.progress, 40);
    }

    #[tokio::test]
    async fn test_update_result_sets_completed_100() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();
        registry
            .update_status(&job.id, JobStatus::Processing, Some(40), None)
            .await
            .unwrap();

        let completed = registry.update_result(&job.id, result()).await.unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.progress, 100);
        assert!(completed.result.is_some());

        // Immediately visible to readers
        let read = registry.get(&job.id).await.unwrap();
        assert_eq!(read.status, JobStatus::Completed);
        assert_eq!(read.progress, 100);
        assert!(read.result.is_some());
    }

    #[tokio::test]
    async fn test_progress_is_monotone_while_processing() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();

        registry
            .update_status(&job.id, JobStatus::Processing, Some(40), None)
            .await
            .unwrap();
        let after = registry
            .update_status(&job.id, JobStatus::Processing, Some(25), None)
            .await
            .unwrap();
        assert_eq!(after.progress, 40);
    }

    #[tokio::test]
    async fn test_subscribe_job_snapshot_then_deltas() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();

        let (snapshot, mut rx) = registry.subscribe_job(&job.id).await.unwrap();
        assert_eq!(snapshot.progress, 0);

        registry
            .update_status(&job.id, JobStatus::Processing, Some(40), None)
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), JobEventType::Updated);
        match event {
            JobEvent::Updated { job } => assert_eq!(job.progress, 40),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_unknown_job_fails() {
        let registry = registry();
        let missing = JobId::new();
        assert!(matches!(
            registry.subscribe_job(&missing).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_per_job_event_ordering() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();
        let (_, mut rx) = registry.subscribe_job(&job.id).await.unwrap();

        for p in [10u8, 20, 30, 40] {
            registry
                .update_status(&job.id, JobStatus::Processing, Some(p), None)
                .await
                .unwrap();
        }

        let mut last = 0;
        for _ in 0..4 {
            if let JobEvent::Updated { job } = rx.recv().await.unwrap() {
                assert!(job.progress >= last);
                last = job.progress;
            }
        }
        assert_eq!(last, 40);
    }

    #[tokio::test]
    async fn test_remove_publishes_and_deletes() {
        let registry = registry();
        let job = registry.create(new_job()).await.unwrap();
        let mut rx = registry.broadcaster().subscribe_global();

        let removed = registry.remove(&job.id).await.unwrap();
        assert_eq!(removed.id, job.id);
        assert!(registry.get(&job.id).await.is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), JobEventType::Removed);
    }

    #[tokio::test]
    async fn test_list_by_status_and_counts() {
        let registry = registry();
        let a = registry.create(new_job()).await.unwrap();
        let _b = registry.create(new_job()).await.unwrap();
        registry
            .update_status(&a.id, JobStatus::Processing, Some(15), None)
            .await
            .unwrap();

        assert_eq!(registry.list().await.len(), 2);
        assert_eq!(
            registry.list_by_status(JobStatus::Processing).await.len(),
            1
        );

        let counts = registry.status_counts().await;
        assert_eq!(counts.uploaded, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.total, 2);
    }
}
