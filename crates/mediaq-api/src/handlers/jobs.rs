//! Job lifecycle handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use mediaq_models::{ExecutionMode, Job, JobId, JobStatus, StatusCounts};
use mediaq_pipeline::CreateJob;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for job creation. The input artifact is expected to be
/// staged on the server filesystem already.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub original_name: String,
    pub size: u64,
    pub input_path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Create a job and start its bound executor.
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = state
        .dispatcher
        .submit(CreateJob {
            original_name: request.original_name,
            size: request.size,
            input_path: request.input_path,
        })
        .await?;

    // Remote jobs get a detached poller watching for the published result.
    if job.mode == ExecutionMode::RemoteQueue {
        if let Some(poller) = &state.poller {
            let poller = Arc::clone(poller);
            let job_id = job.id.clone();
            tokio::spawn(async move {
                if let Err(e) = poller.poll(&job_id).await {
                    warn!(job_id = %job_id, error = %e, "Result polling ended without a result");
                }
            });
        }
    }

    info!(job_id = %job.id, mode = job.mode.as_str(), "Job accepted");
    Ok((StatusCode::CREATED, Json(job)))
}

/// Fetch one job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = JobId::from_string(job_id);
    state
        .registry
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))
}

/// List jobs, optionally filtered by status.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let jobs = match query.status.as_deref() {
        Some(raw) => {
            let status = parse_status(raw)?;
            state.registry.list_by_status(status).await
        }
        None => state.registry.list().await,
    };
    Ok(Json(jobs))
}

/// Remove a job record.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = JobId::from_string(job_id);
    state
        .registry
        .remove(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))
}

/// Aggregate job counts by status.
pub async fn job_stats(State(state): State<AppState>) -> Json<StatusCounts> {
    Json(state.registry.status_counts().await)
}

fn parse_status(raw: &str) -> ApiResult<JobStatus> {
    match raw.trim().to_lowercase().as_str() {
        "uploaded" => Ok(JobStatus::Uploaded),
        "processing" => Ok(JobStatus::Processing),
        "completed" => Ok(JobStatus::Completed),
        "error" => Ok(JobStatus::Error),
        other => Err(ApiError::bad_request(format!("unknown status: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("processing").unwrap(), JobStatus::Processing);
        assert_eq!(parse_status(" Completed ").unwrap(), JobStatus::Completed);
        assert!(parse_status("bogus").is_err());
    }
}
