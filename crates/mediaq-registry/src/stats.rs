//! Periodic stats broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use mediaq_models::JobEvent;

use crate::registry::JobRegistry;

/// Emits aggregate counts by status on the global topic at a fixed
/// interval, independent of any single job's activity.
pub struct StatsBroadcaster {
    registry: Arc<JobRegistry>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl StatsBroadcaster {
    pub fn new(registry: Arc<JobRegistry>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            interval,
            shutdown,
        }
    }

    /// Run the broadcast loop until shutdown is signalled.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Starting stats broadcaster");
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip it so the interval is real.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Stats broadcaster stopped");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let counts = self.registry.status_counts().await;
                    debug!(total = counts.total, processing = counts.processing, "Broadcasting stats");
                    self.registry
                        .broadcaster()
                        .publish(JobEvent::stats(counts))
                        .await;
                }
            }
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::EventBroadcaster;
    use mediaq_models::{ExecutionMode, Job, JobEvent, JobEventType};

    #[tokio::test]
    async fn test_stats_emitted_on_interval() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let registry = Arc::new(JobRegistry::new(broadcaster));
        registry
            .create(Job::new("a.mp4", 1, ExecutionMode::Local))
            .await
            .unwrap();

        let stats = Arc::new(StatsBroadcaster::new(
            Arc::clone(&registry),
            Duration::from_millis(10),
        ));
        let mut rx = registry.broadcaster().subscribe_global();

        let runner = Arc::clone(&stats);
        let handle = tokio::spawn(async move { runner.run().await });

        let event = loop {
            let event = rx.recv().await.unwrap();
            if event.event_type() == JobEventType::Stats {
                break event;
            }
        };
        match event {
            JobEvent::Stats { counts, .. } => {
                assert_eq!(counts.uploaded, 1);
                assert_eq!(counts.total, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }

        stats.shutdown();
        handle.await.unwrap();
    }
}
