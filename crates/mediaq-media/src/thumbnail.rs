//! Thumbnail capture.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use mediaq_pipeline::{PipelineError, PipelineResult, ThumbnailCapture};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

const THUMBNAIL_SCALE_WIDTH: u32 = 480;

/// Capture a single frame at an offset into the media.
pub async fn capture_thumbnail(
    media_path: impl AsRef<Path>,
    offset_secs: f64,
) -> MediaResult<PathBuf> {
    let media_path = media_path.as_ref();
    let output = media_path.with_extension("jpg");

    let filter = format!("scale={THUMBNAIL_SCALE_WIDTH}:-2");
    let cmd = FfmpegCommand::new(media_path, &output)
        .seek(offset_secs)
        .single_frame()
        .video_filter(filter);

    FfmpegRunner::new().run(&cmd).await?;
    Ok(output)
}

/// Thumbnail collaborator backed by ffmpeg.
pub struct FfmpegThumbnailer;

impl FfmpegThumbnailer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfmpegThumbnailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThumbnailCapture for FfmpegThumbnailer {
    async fn capture(&self, input: &Path, offset_secs: f64) -> PipelineResult<PathBuf> {
        capture_thumbnail(input, offset_secs)
            .await
            .map_err(|e| PipelineError::thumbnail(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_output_path() {
        let input = Path::new("/work/clip_out.mp4");
        assert_eq!(input.with_extension("jpg"), PathBuf::from("/work/clip_out.jpg"));
    }
}
