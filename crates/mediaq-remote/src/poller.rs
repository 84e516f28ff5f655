//! Result polling for remotely-executed jobs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::from_slice;
use tracing::{debug, info, warn};

use mediaq_models::{Job, JobId, JobResult};
use mediaq_registry::JobRegistry;

use crate::error::{RemoteError, RemoteResult};
use crate::queue::result_path;
use crate::store::RepoStore;

/// Polling schedule.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between consecutive reads
    pub interval: Duration,
    /// Attempt ceiling before giving up
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

impl PollerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: std::env::var("MEDIAQ_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            max_attempts: std::env::var("MEDIAQ_POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
        }
    }
}

/// Watches the store for a job's result file and folds it back into the
/// registry.
///
/// Reads are idempotent: a poll that finds nothing leaves no trace, and
/// hitting the attempt ceiling surfaces [`RemoteError::PollTimeout`]
/// without marking the job failed. The external worker may still finish
/// later; a subsequent poll can pick the result up. Retryable store
/// errors count as missed attempts rather than aborting the poll.
pub struct ResultPoller {
    store: Arc<dyn RepoStore>,
    registry: Arc<JobRegistry>,
    config: PollerConfig,
}

impl ResultPoller {
    pub fn new(store: Arc<dyn RepoStore>, registry: Arc<JobRegistry>, config: PollerConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Poll until the result file appears or the attempt ceiling is hit.
    pub async fn poll(&self, job_id: &JobId) -> RemoteResult<Job> {
        let path = result_path(job_id);

        for attempt in 1..=self.config.max_attempts {
            debug!(job_id = %job_id, attempt, "Polling for result");

            match self.store.read_file(&path).await {
                Ok(Some(bytes)) => {
                    let result: JobResult = from_slice(&bytes)?;
                    info!(job_id = %job_id, attempt, "Remote result arrived");
                    return self
                        .registry
                        .update_result(job_id, result)
                        .await
                        .ok_or_else(|| {
                            RemoteError::request_failed(format!("job {job_id} no longer registered"))
                        });
                }
                Ok(None) => {}
                // A flaky read burns the attempt; the ceiling still governs.
                Err(e) if e.is_retryable() => {
                    warn!(job_id = %job_id, attempt, error = %e, "Poll attempt failed");
                }
                Err(e) => return Err(e),
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        warn!(job_id = %job_id, attempts = self.config.max_attempts, "Result poll timed out");
        Err(RemoteError::PollTimeout {
            attempts: self.config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use mediaq_models::JobStatus;
    use mediaq_registry::EventBroadcaster;

    fn registry() -> Arc<JobRegistry> {
        Arc::new(JobRegistry::new(Arc::new(EventBroadcaster::new())))
    }

    /// In-memory store that starts returning a file after N reads.
    struct DelayedStore {
        files: Mutex<HashMap<String, Vec<u8>>>,
        visible_after: u32,
        reads: AtomicU32,
    }

    impl DelayedStore {
        fn new(visible_after: u32) -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
                visible_after,
                reads: AtomicU32::new(0),
            }
        }

        fn put(&self, path: &str, bytes: Vec<u8>) {
            self.files.lock().unwrap().insert(path.to_string(), bytes);
        }
    }

    #[async_trait]
    impl RepoStore for DelayedStore {
        async fn write_file(&self, path: &str, content: &[u8], _message: &str) -> RemoteResult<()> {
            self.put(path, content.to_vec());
            Ok(())
        }

        async fn read_file(&self, path: &str) -> RemoteResult<Option<Vec<u8>>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.visible_after {
                return Ok(None);
            }
            Ok(self.files.lock().unwrap().get(path).cloned())
        }
    }

    fn fast_config(max_attempts: u32) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_poll_finds_result_after_misses() {
        let registry = registry();
        let job = registry
            .create(Job::new("clip.mp4", 1024, mediaq_models::ExecutionMode::RemoteQueue))
            .await
            .unwrap();

        let store = Arc::new(DelayedStore::new(3));
        let result = JobResult {
            primary_url: Some("https://cdn.example.com/out.mp4".to_string()),
            thumbnail_url: "https://cdn.example.com/thumb.jpg".to_string(),
            part_urls: vec![],
        };
        store.put(
            &result_path(&job.id),
            serde_json::to_vec(&result).unwrap(),
        );

        let poller = ResultPoller::new(store, registry.clone(), fast_config(10));
        let polled = poller.poll(&job.id).await.unwrap();

        assert_eq!(polled.status, JobStatus::Completed);
        assert_eq!(polled.progress, 100);
        let stored = registry.get(&job.id).await.unwrap();
        assert_eq!(
            stored.result.unwrap().primary_url.as_deref(),
            Some("https://cdn.example.com/out.mp4")
        );
    }

    /// Store whose first N reads fail with a retryable error.
    struct FlakyStore {
        inner: DelayedStore,
        failures: u32,
    }

    #[async_trait]
    impl RepoStore for FlakyStore {
        async fn write_file(&self, path: &str, content: &[u8], message: &str) -> RemoteResult<()> {
            self.inner.write_file(path, content, message).await
        }

        async fn read_file(&self, path: &str) -> RemoteResult<Option<Vec<u8>>> {
            let n = self.inner.reads.load(Ordering::SeqCst);
            if n < self.failures {
                self.inner.reads.fetch_add(1, Ordering::SeqCst);
                return Err(RemoteError::request_failed("store unavailable"));
            }
            self.inner.read_file(path).await
        }
    }

    #[tokio::test]
    async fn test_poll_survives_transient_store_errors() {
        let registry = registry();
        let job = registry
            .create(Job::new("clip.mp4", 1024, mediaq_models::ExecutionMode::RemoteQueue))
            .await
            .unwrap();

        let inner = DelayedStore::new(0);
        let result = JobResult {
            primary_url: Some("https://cdn.example.com/out.mp4".to_string()),
            thumbnail_url: "https://cdn.example.com/thumb.jpg".to_string(),
            part_urls: vec![],
        };
        inner.put(&result_path(&job.id), serde_json::to_vec(&result).unwrap());
        let store = Arc::new(FlakyStore { inner, failures: 2 });

        let poller = ResultPoller::new(store, registry.clone(), fast_config(5));
        let polled = poller.poll(&job.id).await.unwrap();
        assert_eq!(polled.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_poll_timeout_leaves_job_untouched() {
        let registry = registry();
        let job = registry
            .create(Job::new("clip.mp4", 1024, mediaq_models::ExecutionMode::RemoteQueue))
            .await
            .unwrap();
        registry
            .update_status(&job.id, JobStatus::Processing, Some(15), None)
            .await;

        let store = Arc::new(DelayedStore::new(u32::MAX));
        let poller = ResultPoller::new(store.clone(), registry.clone(), fast_config(4));

        let err = poller.poll(&job.id).await.unwrap_err();
        assert!(matches!(err, RemoteError::PollTimeout { attempts: 4 }));
        assert_eq!(store.reads.load(Ordering::SeqCst), 4);

        let stored = registry.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.progress, 15);
    }
}
