//! Execution dispatcher.
//!
//! Chooses the execution strategy per job at creation time from the
//! process-wide configuration and binds it permanently to the job record.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use mediaq_models::{ExecutionMode, Job};
use mediaq_registry::JobRegistry;

use crate::collaborators::RemoteHandoff;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::local::LocalPipeline;

/// Request to create a job. The input artifact is already staged on the
/// local filesystem; how it got there is outside the core.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub original_name: String,
    pub size: u64,
    pub input_path: PathBuf,
}

/// Creates job records and starts the bound executor.
pub struct ExecutionDispatcher {
    registry: Arc<JobRegistry>,
    local: Arc<LocalPipeline>,
    remote: Arc<dyn RemoteHandoff>,
    config: PipelineConfig,
}

impl ExecutionDispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        local: Arc<LocalPipeline>,
        remote: Arc<dyn RemoteHandoff>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            local,
            remote,
            config,
        }
    }

    /// Validate the request, create the record and start execution.
    ///
    /// Local jobs run detached; the call returns as soon as the record
    /// exists. Remote jobs return only after the handoff commit: if the
    /// store write fails, the record is removed and the error propagates,
    /// leaving no job behind marked `processing`.
    pub async fn submit(&self, request: CreateJob) -> PipelineResult<Job> {
        self.validate(&request).await?;

        let job = Job::new(&request.original_name, request.size, self.config.mode);
        let job = self.registry.create(job).await?;

        match job.mode {
            ExecutionMode::Local => {
                let pipeline = Arc::clone(&self.local);
                let job_id = job.id.clone();
                let input = request.input_path.clone();
                tokio::spawn(async move {
                    pipeline.run(job_id, input).await;
                });
                Ok(job)
            }
            ExecutionMode::RemoteQueue => {
                if let Err(e) = self.remote.enqueue(&job, &request.input_path).await {
                    error!(job_id = %job.id, error = %e, "Remote handoff failed, removing job");
                    self.registry.remove(&job.id).await;
                    return Err(e);
                }
                info!(job_id = %job.id, "Job handed off to remote queue");
                Ok(self.registry.get(&job.id).await.unwrap_or(job))
            }
        }
    }

    async fn validate(&self, request: &CreateJob) -> PipelineResult<()> {
        if request.original_name.trim().is_empty() {
            return Err(PipelineError::invalid_input("original name is empty"));
        }
        if request.size == 0 {
            return Err(PipelineError::invalid_input("size is zero"));
        }
        if !tokio::fs::try_exists(&request.input_path).await.unwrap_or(false) {
            return Err(PipelineError::invalid_input(format!(
                "input artifact missing: {}",
                request.input_path.display()
            )));
        }
        Ok(())
    }
}
