//! Local pipeline executor.
//!
//! Runs the fixed stage sequence against the collaborators, pushing
//! aggregated progress through the registry after each step. Failure at
//! any stage transitions the job to `error` with the triggering message;
//! stages already completed are not rolled back. Notification and cleanup
//! are best-effort and never affect job status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mediaq_models::{Job, JobId, JobResult, JobStatus, PipelineStage};
use mediaq_registry::JobRegistry;

use crate::collaborators::{
    ArtifactKind, ArtifactUploader, MediaAnalyzer, MediaTransformer, Notifier, ThumbnailCapture,
    UploadItem,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Drives one job through the fixed stage sequence.
pub struct LocalPipeline {
    registry: Arc<JobRegistry>,
    analyzer: Arc<dyn MediaAnalyzer>,
    transformer: Arc<dyn MediaTransformer>,
    thumbnailer: Arc<dyn ThumbnailCapture>,
    uploader: Arc<dyn ArtifactUploader>,
    notifier: Option<Arc<dyn Notifier>>,
    config: PipelineConfig,
}

impl LocalPipeline {
    pub fn new(
        registry: Arc<JobRegistry>,
        analyzer: Arc<dyn MediaAnalyzer>,
        transformer: Arc<dyn MediaTransformer>,
        thumbnailer: Arc<dyn ThumbnailCapture>,
        uploader: Arc<dyn ArtifactUploader>,
        notifier: Option<Arc<dyn Notifier>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            analyzer,
            transformer,
            thumbnailer,
            uploader,
            notifier,
            config,
        }
    }

    /// Run the pipeline to completion or failure, then fire side effects.
    pub async fn run(&self, job_id: JobId, input: PathBuf) {
        info!(job_id = %job_id, "Starting local pipeline");

        match self.execute(&job_id, &input).await {
            Ok(job) => {
                info!(job_id = %job_id, "Pipeline finished");
                self.notify_completed(&job).await;
                self.cleanup_input(&job_id, &input).await;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Pipeline failed");
                let failed = self
                    .registry
                    .update_status(&job_id, JobStatus::Error, None, Some(e.to_string()))
                    .await;
                if let Some(job) = failed {
                    self.notify_failed(&job).await;
                }
            }
        }
    }

    /// The stage sequence. Progress lands in each stage's configured range.
    async fn execute(&self, job_id: &JobId, input: &Path) -> PipelineResult<Job> {
        let ranges = &self.config.ranges;

        // Stage 1: analyze
        self.set_progress(job_id, ranges.stage_start(PipelineStage::Analyze))
            .await;
        let info = self.analyzer.analyze(input).await?;
        debug!(job_id = %job_id, duration = info.duration, codec = %info.codec, "Analysis done");
        self.set_progress(job_id, ranges.stage_end(PipelineStage::Analyze))
            .await;

        // Stage 2: transform with relayed stage-local progress
        let output = {
            let (tx, rx) = mpsc::channel(16);
            let forwarder = self.spawn_progress_forwarder(job_id.clone(), PipelineStage::Transform, rx);
            let result = self
                .transformer
                .transform(input, &self.config.preset, tx)
                .await;
            let _ = forwarder.await;
            result?
        };
        self.set_progress(job_id, ranges.stage_end(PipelineStage::Transform))
            .await;

        // Stage 3: split when the primary output exceeds the ceiling
        let output_size = tokio::fs::metadata(&output).await?.len();
        let parts = if output_size > self.config.size_ceiling_bytes {
            info!(
                job_id = %job_id,
                size = output_size,
                ceiling = self.config.size_ceiling_bytes,
                "Output exceeds ceiling, splitting"
            );
            let parts = self
                .transformer
                .split(&output, self.config.size_ceiling_bytes)
                .await?;
            if parts.is_empty() {
                return Err(PipelineError::split("split produced no parts"));
            }
            parts
        } else {
            Vec::new()
        };

        // Stage 4: thumbnail
        self.set_progress(job_id, ranges.stage_start(PipelineStage::Thumbnail))
            .await;
        let thumbnail = self
            .thumbnailer
            .capture(&output, self.config.thumbnail_offset_secs)
            .await?;
        self.set_progress(job_id, ranges.stage_end(PipelineStage::Thumbnail))
            .await;

        // Stage 5: upload primary or parts, plus thumbnail
        let mut items = Vec::new();
        if parts.is_empty() {
            items.push(UploadItem::new(&output, ArtifactKind::Primary));
        } else {
            for part in &parts {
                items.push(UploadItem::new(part, ArtifactKind::Part));
            }
        }
        items.push(UploadItem::new(&thumbnail, ArtifactKind::Thumbnail));

        let uploaded = {
            let (tx, rx) = mpsc::channel(16);
            let forwarder = self.spawn_progress_forwarder(job_id.clone(), PipelineStage::Upload, rx);
            let result = self.uploader.upload(job_id, items, tx).await;
            let _ = forwarder.await;
            result?
        };

        // Stage 6: finalize
        self.set_progress(job_id, ranges.stage_start(PipelineStage::Finalize))
            .await;
        let thumbnail_url = uploaded
            .thumbnail_url
            .ok_or_else(|| PipelineError::upload("uploader returned no thumbnail URL"))?;
        let result = JobResult {
            primary_url: uploaded.primary_url,
            thumbnail_url,
            part_urls: uploaded.part_urls,
        };

        match self.registry.update_result(job_id, result).await {
            Some(job) => Ok(job),
            None => {
                warn!(job_id = %job_id, "Result rejected by registry");
                self.registry
                    .get(job_id)
                    .await
                    .ok_or_else(|| PipelineError::invalid_input("job removed during processing"))
            }
        }
    }

    /// Forward stage-local progress values through the aggregator into the
    /// registry until the delegated operation drops its sender.
    fn spawn_progress_forwarder(
        &self,
        job_id: JobId,
        stage: PipelineStage,
        mut rx: mpsc::Receiver<f64>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let ranges = self.config.ranges.clone();
        tokio::spawn(async move {
            while let Some(local) = rx.recv().await {
                let overall = ranges.overall(stage, local);
                registry
                    .update_status(&job_id, JobStatus::Processing, Some(overall), None)
                    .await;
            }
        })
    }

    async fn set_progress(&self, job_id: &JobId, progress: u8) {
        self.registry
            .update_status(job_id, JobStatus::Processing, Some(progress), None)
            .await;
    }

    async fn notify_completed(&self, job: &Job) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.job_completed(job).await {
                warn!(job_id = %job.id, error = %e, "Completion notification failed");
            }
        }
    }

    async fn notify_failed(&self, job: &Job) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.job_failed(job).await {
                warn!(job_id = %job.id, error = %e, "Failure notification failed");
            }
        }
    }

    async fn cleanup_input(&self, job_id: &JobId, input: &Path) {
        if let Err(e) = tokio::fs::remove_file(input).await {
            warn!(job_id = %job_id, error = %e, "Input cleanup failed");
        }
    }
}
