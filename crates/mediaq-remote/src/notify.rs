//! Issue-based completion notifications.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use mediaq_models::Job;
use mediaq_pipeline::{Notifier, PipelineError, PipelineResult};

use crate::error::{RemoteError, RemoteResult};
use crate::store::RepoStoreConfig;

#[derive(Debug, Serialize)]
struct NewIssue {
    title: String,
    body: String,
    labels: Vec<String>,
}

/// Posts a tracker issue when a job reaches a terminal state.
///
/// Strictly a side channel: callers treat failures here as log-worthy
/// noise, never as pipeline failures.
pub struct IssueNotifier {
    http: Client,
    config: RepoStoreConfig,
}

impl IssueNotifier {
    pub fn new(config: RepoStoreConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .user_agent("mediaq")
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> RemoteResult<Self> {
        Self::new(RepoStoreConfig::from_env()?)
    }

    fn issues_url(&self) -> String {
        format!(
            "{}/repos/{}/issues",
            self.config.base_url.trim_end_matches('/'),
            self.config.repo
        )
    }

    async fn post_issue(&self, issue: &NewIssue) -> RemoteResult<()> {
        debug!(title = %issue.title, "Posting notification issue");
        let response = self
            .http
            .post(self.issues_url())
            .bearer_auth(&self.config.token)
            .json(issue)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::StatusError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

fn completed_issue(job: &Job) -> NewIssue {
    let result_line = match &job.result {
        Some(r) => match &r.primary_url {
            Some(url) => format!("Output: {url}"),
            None => format!("Output parts: {}", r.part_urls.len()),
        },
        None => "No result attached".to_string(),
    };
    NewIssue {
        title: format!("Job {} completed: {}", job.id, job.original_name),
        body: format!("Status: {}\nProgress: {}\n{}", job.status, job.progress, result_line),
        labels: vec!["job-completed".to_string()],
    }
}

fn failed_issue(job: &Job) -> NewIssue {
    NewIssue {
        title: format!("Job {} failed: {}", job.id, job.original_name),
        body: format!(
            "Status: {}\nProgress: {}\nError: {}",
            job.status,
            job.progress,
            job.error_message.as_deref().unwrap_or("unknown")
        ),
        labels: vec!["job-failed".to_string()],
    }
}

#[async_trait]
impl Notifier for IssueNotifier {
    async fn job_completed(&self, job: &Job) -> PipelineResult<()> {
        self.post_issue(&completed_issue(job))
            .await
            .map_err(|e| PipelineError::Notify(e.to_string()))?;
        info!(job_id = %job.id, "Completion issue posted");
        Ok(())
    }

    async fn job_failed(&self, job: &Job) -> PipelineResult<()> {
        self.post_issue(&failed_issue(job))
            .await
            .map_err(|e| PipelineError::Notify(e.to_string()))?;
        info!(job_id = %job.id, "Failure issue posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaq_models::{ExecutionMode, JobResult};

    #[test]
    fn test_completed_issue_mentions_output() {
        let mut job = Job::new("clip.mp4", 1024, ExecutionMode::Local);
        job.complete(JobResult {
            primary_url: Some("https://cdn.example.com/out.mp4".into()),
            thumbnail_url: "https://cdn.example.com/thumb.jpg".into(),
            part_urls: vec![],
        });

        let issue = completed_issue(&job);
        assert!(issue.title.contains("completed"));
        assert!(issue.body.contains("https://cdn.example.com/out.mp4"));
        assert_eq!(issue.labels, vec!["job-completed"]);
    }

    #[test]
    fn test_failed_issue_carries_error() {
        let mut job = Job::new("clip.mp4", 1024, ExecutionMode::Local);
        job.start(20);
        job.fail("codec error");

        let issue = failed_issue(&job);
        assert!(issue.title.contains("failed"));
        assert!(issue.body.contains("codec error"));
        assert_eq!(issue.labels, vec!["job-failed"]);
    }
}
