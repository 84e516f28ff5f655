//! Application state.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use mediaq_media::{FfmpegThumbnailer, FfmpegTransformer, FfprobeAnalyzer};
use mediaq_models::{ExecutionMode, Job};
use mediaq_pipeline::{
    ExecutionDispatcher, LocalPipeline, Notifier, PipelineConfig, PipelineError, PipelineResult,
    RemoteHandoff,
};
use mediaq_registry::{EventBroadcaster, JobRegistry};
use mediaq_remote::{
    HttpRepoStore, IssueNotifier, PollerConfig, RemoteQueueExecutor, RepoStore, ResultPoller,
};
use mediaq_storage::{ObjectStoreClient, S3ArtifactUploader};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<JobRegistry>,
    pub dispatcher: Arc<ExecutionDispatcher>,
    /// Present only when remote queue execution is configured.
    pub poller: Option<Arc<ResultPoller>>,
}

impl AppState {
    /// Create new application state, wiring all collaborators.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let registry = Arc::new(JobRegistry::new(Arc::clone(&broadcaster)));

        let pipeline_config = PipelineConfig::from_env();
        info!(
            mode = pipeline_config.mode.as_str(),
            preset = %pipeline_config.preset,
            "Pipeline configured"
        );

        let uploader = Arc::new(S3ArtifactUploader::new(ObjectStoreClient::from_env()?));

        let notifier: Option<Arc<dyn Notifier>> = match IssueNotifier::from_env() {
            Ok(n) => Some(Arc::new(n)),
            Err(e) => {
                warn!(error = %e, "Issue notifications disabled");
                None
            }
        };

        let local = Arc::new(LocalPipeline::new(
            Arc::clone(&registry),
            Arc::new(FfprobeAnalyzer::new()),
            Arc::new(FfmpegTransformer::new()),
            Arc::new(FfmpegThumbnailer::new()),
            uploader,
            notifier,
            pipeline_config.clone(),
        ));

        let (remote, poller): (Arc<dyn RemoteHandoff>, Option<Arc<ResultPoller>>) =
            match pipeline_config.mode {
                ExecutionMode::RemoteQueue => {
                    let store: Arc<dyn RepoStore> = Arc::new(HttpRepoStore::from_env()?);
                    let executor = RemoteQueueExecutor::new(
                        Arc::clone(&store),
                        Arc::clone(&registry),
                        pipeline_config.remote_handoff_progress,
                    );
                    let poller =
                        ResultPoller::new(store, Arc::clone(&registry), PollerConfig::from_env());
                    (Arc::new(executor), Some(Arc::new(poller)))
                }
                ExecutionMode::Local => (Arc::new(RemoteDisabled), None),
            };

        let dispatcher = Arc::new(ExecutionDispatcher::new(
            Arc::clone(&registry),
            local,
            remote,
            pipeline_config,
        ));

        Ok(Self {
            config,
            registry,
            dispatcher,
            poller,
        })
    }
}

/// Handoff stand-in when the remote queue is not configured. Never reached
/// while the execution mode is local; kept as a hard error just in case.
struct RemoteDisabled;

#[async_trait]
impl RemoteHandoff for RemoteDisabled {
    async fn enqueue(&self, _job: &Job, _input: &Path) -> PipelineResult<()> {
        Err(PipelineError::remote_handoff("remote queue not configured"))
    }
}
