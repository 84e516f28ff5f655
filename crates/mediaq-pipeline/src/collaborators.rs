//! Trait seams for external collaborators.
//!
//! The pipeline only ever sees these contracts. Implementations live in
//! their own crates (ffmpeg in mediaq-media, object storage in
//! mediaq-storage, the repo store in mediaq-remote) and are wired in as
//! `Arc<dyn ...>` at startup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

use mediaq_models::{Job, JobId, MediaInfo};

use crate::error::PipelineResult;

/// Channel for stage-local progress percentages (0-100).
///
/// Delegated operations push values as they go; the executor consumes the
/// sequence and forwards it through the stage aggregator. Values are
/// expected to be non-decreasing; the registry clamps regressions anyway.
pub type StageProgressSender = mpsc::Sender<f64>;

/// Media analysis: technical properties of an input artifact.
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    async fn analyze(&self, input: &Path) -> PipelineResult<MediaInfo>;
}

/// Media transform: apply a preset, produce the primary output artifact,
/// optionally split it into ordered parts.
#[async_trait]
pub trait MediaTransformer: Send + Sync {
    /// Produce the primary output, reporting stage-local progress.
    async fn transform(
        &self,
        input: &Path,
        preset: &str,
        progress: StageProgressSender,
    ) -> PipelineResult<PathBuf>;

    /// Split an artifact into ordered parts no larger than `max_part_bytes`.
    async fn split(&self, artifact: &Path, max_part_bytes: u64) -> PipelineResult<Vec<PathBuf>>;
}

/// Thumbnail capture at a time offset into the media.
#[async_trait]
pub trait ThumbnailCapture: Send + Sync {
    async fn capture(&self, input: &Path, offset_secs: f64) -> PipelineResult<PathBuf>;
}

/// What an uploaded artifact is, for URL resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Primary,
    Part,
    Thumbnail,
}

/// One artifact to upload.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl UploadItem {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Resolved public URLs per artifact kind. Part URLs keep request order.
#[derive(Debug, Clone, Default)]
pub struct UploadedArtifacts {
    pub primary_url: Option<String>,
    pub part_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
}

/// Artifact upload, atomic per call: either every item resolves to a URL
/// or the whole call fails. No partial result ever reaches the pipeline.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(
        &self,
        job_id: &JobId,
        items: Vec<UploadItem>,
        progress: StageProgressSender,
    ) -> PipelineResult<UploadedArtifacts>;
}

/// Fire-and-forget notification side channel (issue creation).
///
/// Failures here must never alter job status; the pipeline swallows them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn job_completed(&self, job: &Job) -> PipelineResult<()>;
    async fn job_failed(&self, job: &Job) -> PipelineResult<()>;
}

/// Handoff of a job's input to the external asynchronous worker.
///
/// The implementation writes the artifact into the repo store and marks
/// the job processing at the fixed handoff progress; its responsibility
/// ends there. Failure propagates to the creation caller.
#[async_trait]
pub trait RemoteHandoff: Send + Sync {
    async fn enqueue(&self, job: &Job, input: &Path) -> PipelineResult<()>;
}
