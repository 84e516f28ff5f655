//! Job record and state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
///
/// Transitions are `uploaded -> processing -> {completed | error}`.
/// `completed` and `error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Input received, no executor has started yet
    #[default]
    Uploaded,
    /// An executor is working on the job
    Processing,
    /// Job finished successfully, result attached
    Completed,
    /// Job failed, error message attached
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more transitions permitted).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution strategy, bound once at job creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the full stage pipeline in-process
    #[default]
    Local,
    /// Hand the input to an external worker via the repo store
    RemoteQueue,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Local => "local",
            ExecutionMode::RemoteQueue => "remote_queue",
        }
    }

    /// Parse from a configuration string. Unknown values fall back to local.
    pub fn from_config(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "remote" | "remote_queue" => ExecutionMode::RemoteQueue,
            _ => ExecutionMode::Local,
        }
    }
}

/// Result payload attached when a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    /// Public URL of the primary output artifact (absent when split into parts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_url: Option<String>,
    /// Public URL of the thumbnail
    pub thumbnail_url: String,
    /// Ordered public URLs of the output parts (empty for a single artifact)
    #[serde(default)]
    pub part_urls: Vec<String>,
}

/// A tracked unit of pipeline work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID, also the topic and poll key
    pub id: JobId,

    /// Original input file name
    pub original_name: String,

    /// Input size in bytes
    pub size: u64,

    /// Execution strategy bound at creation
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Current lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Overall progress (0-100), non-decreasing while processing
    #[serde(default)]
    pub progress: u8,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Timestamp of the most recent mutation
    pub last_update: DateTime<Utc>,

    /// Error message (present only when status is `error`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Result payload (present only when status is `completed`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl Job {
    /// Create a new job in the `uploaded` state.
    pub fn new(original_name: impl Into<String>, size: u64, mode: ExecutionMode) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            original_name: original_name.into(),
            size,
            mode,
            status: JobStatus::Uploaded,
            progress: 0,
            created_at: now,
            last_update: now,
            error_message: None,
            result: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `processing` at the given progress.
    ///
    /// Progress never decreases while processing.
    pub fn start(&mut self, progress: u8) {
        self.status = JobStatus::Processing;
        self.progress = self.progress.max(progress.min(100));
        self.last_update = Utc::now();
    }

    /// Update progress, keeping it monotone.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
        self.last_update = Utc::now();
    }

    /// Mark the job completed with its result.
    pub fn complete(&mut self, result: JobResult) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.error_message = None;
        self.last_update = Utc::now();
    }

    /// Mark the job failed. Progress stays at its last reported value.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error_message = Some(error.into());
        self.last_update = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new("clip.mp4", 1024, ExecutionMode::Local);
        assert_eq!(job.status, JobStatus::Uploaded);
        assert_eq!(job.progress, 0);
        assert!(job.result.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new("clip.mp4", 1024, ExecutionMode::Local);

        job.start(10);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 10);

        job.set_progress(40);
        assert_eq!(job.progress, 40);

        // Progress never regresses
        job.set_progress(20);
        assert_eq!(job.progress, 40);

        job.complete(JobResult {
            primary_url: Some("https://cdn.example/out.mp4".into()),
            thumbnail_url: "https://cdn.example/thumb.jpg".into(),
            part_urls: vec![],
        });
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.result.is_some());
        assert!(job.is_terminal());
    }

    #[test]
    fn test_job_failure_keeps_progress() {
        let mut job = Job::new("clip.mp4", 1024, ExecutionMode::Local);
        job.start(20);
        job.fail("codec error");

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 20);
        assert_eq!(job.error_message.as_deref(), Some("codec error"));
    }

    #[test]
    fn test_execution_mode_from_config() {
        assert_eq!(ExecutionMode::from_config("local"), ExecutionMode::Local);
        assert_eq!(
            ExecutionMode::from_config("remote_queue"),
            ExecutionMode::RemoteQueue
        );
        assert_eq!(
            ExecutionMode::from_config("REMOTE"),
            ExecutionMode::RemoteQueue
        );
        assert_eq!(ExecutionMode::from_config("bogus"), ExecutionMode::Local);
    }

    #[test]
    fn test_job_serialization_snake_case() {
        let job = Job::new("clip.mp4", 1, ExecutionMode::RemoteQueue);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"uploaded\""));
        assert!(json.contains("\"mode\":\"remote_queue\""));
        // Optional fields are omitted until set
        assert!(!json.contains("error_message"));
        assert!(!json.contains("\"result\""));
    }
}
