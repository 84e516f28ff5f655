//! Artifact uploader collaborator.

use async_trait::async_trait;
use tracing::info;

use mediaq_models::JobId;
use mediaq_pipeline::{
    ArtifactKind, ArtifactUploader, PipelineError, PipelineResult, StageProgressSender, UploadItem,
    UploadedArtifacts,
};

use crate::client::{content_type_for, ObjectStoreClient};

/// Uploads job artifacts under `jobs/{job_id}/` and resolves public URLs.
pub struct S3ArtifactUploader {
    client: ObjectStoreClient,
}

impl S3ArtifactUploader {
    pub fn new(client: ObjectStoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactUploader for S3ArtifactUploader {
    async fn upload(
        &self,
        job_id: &JobId,
        items: Vec<UploadItem>,
        progress: StageProgressSender,
    ) -> PipelineResult<UploadedArtifacts> {
        let total = items.len();
        let mut uploaded = UploadedArtifacts::default();

        for (index, item) in items.into_iter().enumerate() {
            let name = item
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| PipelineError::upload("artifact path has no file name"))?;
            let key = format!("jobs/{job_id}/{name}");

            // First failure aborts the whole batch; no partial result is
            // ever returned to the pipeline.
            self.client
                .upload_file(&item.path, &key, content_type_for(&name))
                .await
                .map_err(|e| PipelineError::upload(e.to_string()))?;

            let url = self.client.public_url(&key);
            match item.kind {
                ArtifactKind::Primary => uploaded.primary_url = Some(url),
                ArtifactKind::Part => uploaded.part_urls.push(url),
                ArtifactKind::Thumbnail => uploaded.thumbnail_url = Some(url),
            }

            let pct = (index + 1) as f64 * 100.0 / total as f64;
            let _ = progress.try_send(pct);
        }

        info!(job_id = %job_id, artifacts = total, "Upload batch complete");
        Ok(uploaded)
    }
}
