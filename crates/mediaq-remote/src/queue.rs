//! Remote queue handoff.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use mediaq_models::{Job, JobId, JobStatus};
use mediaq_pipeline::{PipelineError, PipelineResult, RemoteHandoff};
use mediaq_registry::JobRegistry;

use crate::store::RepoStore;

/// Store path the input artifact is committed under.
pub fn input_path(job_id: &JobId) -> String {
    format!("queue/{job_id}/input.bin")
}

/// Store path the external worker publishes the result to.
pub fn result_path(job_id: &JobId) -> String {
    format!("results/{job_id}.json")
}

/// Hands jobs to the external worker by committing their input artifact.
///
/// After a successful commit the job is parked at the fixed handoff
/// progress; the result poller picks it up from there.
pub struct RemoteQueueExecutor {
    store: Arc<dyn RepoStore>,
    registry: Arc<JobRegistry>,
    handoff_progress: u8,
}

impl RemoteQueueExecutor {
    pub fn new(store: Arc<dyn RepoStore>, registry: Arc<JobRegistry>, handoff_progress: u8) -> Self {
        Self {
            store,
            registry,
            handoff_progress,
        }
    }
}

#[async_trait]
impl RemoteHandoff for RemoteQueueExecutor {
    async fn enqueue(&self, job: &Job, input: &Path) -> PipelineResult<()> {
        let bytes = tokio::fs::read(input).await?;
        let path = input_path(&job.id);
        let message = format!("Enqueue job {}", job.id);

        self.store
            .write_file(&path, &bytes, &message)
            .await
            .map_err(|e| PipelineError::remote_handoff(e.to_string()))?;

        self.registry
            .update_status(&job.id, JobStatus::Processing, Some(self.handoff_progress), None)
            .await;

        info!(job_id = %job.id, path, bytes = bytes.len(), "Job handed to remote queue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_paths() {
        let id = JobId::new();
        assert_eq!(input_path(&id), format!("queue/{id}/input.bin"));
        assert_eq!(result_path(&id), format!("results/{id}.json"));
    }
}
