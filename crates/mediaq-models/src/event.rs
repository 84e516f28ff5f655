//! Event vocabulary published to topic subscribers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId, JobStatus};

/// Event kinds, used by transports for routing and by clients for branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobEventType {
    Created,
    Updated,
    Completed,
    Removed,
    Stats,
    Snapshot,
}

impl JobEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventType::Created => "created",
            JobEventType::Updated => "updated",
            JobEventType::Completed => "completed",
            JobEventType::Removed => "removed",
            JobEventType::Stats => "stats",
            JobEventType::Snapshot => "snapshot",
        }
    }
}

/// Aggregate job counts by status, emitted periodically on the global topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatusCounts {
    pub uploaded: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
    pub total: usize,
}

impl StatusCounts {
    /// Add one job with the given status to the counts.
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Uploaded => self.uploaded += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Error => self.error += 1,
        }
        self.total += 1;
    }
}

/// Event envelope delivered to subscribers.
///
/// `completed` is distinct from a generic `updated` so clients can branch
/// on first arrival of the result. `snapshot` carries the full current job
/// state sent to a new subscriber before any deltas.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job record was created
    Created { job: Job },

    /// Job fields changed (status and/or progress)
    Updated { job: Job },

    /// Job reached `completed` with its result attached
    Completed { job: Job },

    /// Job record was removed
    Removed { job_id: JobId },

    /// Periodic aggregate counts by status
    Stats {
        counts: StatusCounts,
        timestamp: DateTime<Utc>,
    },

    /// Full current state, sent on subscribe before any deltas
    Snapshot { job: Job },
}

impl JobEvent {
    pub fn created(job: Job) -> Self {
        JobEvent::Created { job }
    }

    pub fn updated(job: Job) -> Self {
        JobEvent::Updated { job }
    }

    pub fn completed(job: Job) -> Self {
        JobEvent::Completed { job }
    }

    pub fn removed(job_id: JobId) -> Self {
        JobEvent::Removed { job_id }
    }

    pub fn stats(counts: StatusCounts) -> Self {
        JobEvent::Stats {
            counts,
            timestamp: Utc::now(),
        }
    }

    pub fn snapshot(job: Job) -> Self {
        JobEvent::Snapshot { job }
    }

    /// Get the event type.
    pub fn event_type(&self) -> JobEventType {
        match self {
            JobEvent::Created { .. } => JobEventType::Created,
            JobEvent::Updated { .. } => JobEventType::Updated,
            JobEvent::Completed { .. } => JobEventType::Completed,
            JobEvent::Removed { .. } => JobEventType::Removed,
            JobEvent::Stats { .. } => JobEventType::Stats,
            JobEvent::Snapshot { .. } => JobEventType::Snapshot,
        }
    }

    /// The job this event concerns, if any (`stats` is job-less).
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobEvent::Created { job }
            | JobEvent::Updated { job }
            | JobEvent::Completed { job }
            | JobEvent::Snapshot { job } => Some(&job.id),
            JobEvent::Removed { job_id } => Some(job_id),
            JobEvent::Stats { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ExecutionMode;

    #[test]
    fn test_event_serialization_tag() {
        let job = Job::new("clip.mp4", 10, ExecutionMode::Local);
        let json = serde_json::to_string(&JobEvent::created(job)).unwrap();
        assert!(json.contains("\"type\":\"created\""));
        assert!(json.contains("\"original_name\":\"clip.mp4\""));
    }

    #[test]
    fn test_event_type_and_job_id() {
        let job = Job::new("clip.mp4", 10, ExecutionMode::Local);
        let id = job.id.clone();

        let event = JobEvent::completed(job);
        assert_eq!(event.event_type(), JobEventType::Completed);
        assert_eq!(event.job_id(), Some(&id));

        let stats = JobEvent::stats(StatusCounts::default());
        assert_eq!(stats.event_type(), JobEventType::Stats);
        assert!(stats.job_id().is_none());
    }

    #[test]
    fn test_status_counts_record() {
        let mut counts = StatusCounts::default();
        counts.record(JobStatus::Uploaded);
        counts.record(JobStatus::Processing);
        counts.record(JobStatus::Processing);
        counts.record(JobStatus::Error);

        assert_eq!(counts.uploaded, 1);
        assert_eq!(counts.processing, 2);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.total, 4);
    }
}
