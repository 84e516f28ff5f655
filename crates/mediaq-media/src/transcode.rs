//! FFmpeg transform and size-based split.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use mediaq_pipeline::{MediaTransformer, PipelineError, PipelineResult, StageProgressSender};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Encoder arguments for a named processing preset.
fn preset_args(preset: &str) -> MediaResult<Vec<&'static str>> {
    match preset {
        "standard" => Ok(vec![
            "-c:v", "libx264", "-preset", "veryfast", "-crf", "23", "-c:a", "aac", "-b:a", "128k",
        ]),
        "archive" => Ok(vec![
            "-c:v", "libx264", "-preset", "slow", "-crf", "18", "-c:a", "aac", "-b:a", "192k",
        ]),
        "fast" => Ok(vec![
            "-c:v", "libx264", "-preset", "ultrafast", "-crf", "28", "-c:a", "aac", "-b:a", "96k",
        ]),
        other => Err(MediaError::UnknownPreset(other.to_string())),
    }
}

/// Transform collaborator backed by ffmpeg.
pub struct FfmpegTransformer {
    runner: FfmpegRunner,
}

impl FfmpegTransformer {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new(),
        }
    }

    async fn transform_inner(
        &self,
        input: &Path,
        preset: &str,
        progress: StageProgressSender,
    ) -> MediaResult<PathBuf> {
        let info = probe_media(input).await?;
        let output = sibling_path(input, "_out.mp4");
        let args = preset_args(preset)?;

        info!(input = %input.display(), preset = %preset, "Transforming");
        let cmd = FfmpegCommand::new(input, &output)
            .output_args(args)
            .output_arg("-movflags")
            .output_arg("+faststart");

        self.runner
            .run_with_progress(&cmd, info.duration_ms(), move |pct| {
                // Delegated operations report stage-local percentages;
                // drop the value if the consumer has gone away.
                let _ = progress.try_send(pct);
            })
            .await?;

        Ok(output)
    }

    async fn split_inner(&self, artifact: &Path, max_part_bytes: u64) -> MediaResult<Vec<PathBuf>> {
        let info = probe_media(artifact).await?;
        let size = tokio::fs::metadata(artifact).await?.len();

        // Segment length so each part stays under the ceiling, assuming
        // roughly constant bitrate across the artifact.
        let segment_secs =
            ((info.duration * max_part_bytes as f64 / size as f64).floor()).max(1.0);
        debug!(
            artifact = %artifact.display(),
            segment_secs,
            "Splitting into parts"
        );

        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
        let pattern = dir.join(format!("{stem}_part_%03d.mp4"));

        let cmd = FfmpegCommand::new(artifact, &pattern)
            .output_arg("-c")
            .output_arg("copy")
            .output_arg("-map")
            .output_arg("0")
            .output_arg("-f")
            .output_arg("segment")
            .output_arg("-segment_time")
            .output_arg(format!("{segment_secs}"))
            .output_arg("-reset_timestamps")
            .output_arg("1");
        self.runner.run(&cmd).await?;

        // Collect produced parts in order
        let prefix = format!("{stem}_part_");
        let mut parts = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".mp4") {
                parts.push(entry.path());
            }
        }
        parts.sort();

        if parts.is_empty() {
            return Err(MediaError::ffmpeg_failed("segment produced no parts"));
        }
        Ok(parts)
    }
}

impl Default for FfmpegTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTransformer for FfmpegTransformer {
    async fn transform(
        &self,
        input: &Path,
        preset: &str,
        progress: StageProgressSender,
    ) -> PipelineResult<PathBuf> {
        self.transform_inner(input, preset, progress)
            .await
            .map_err(|e| PipelineError::transform(e.to_string()))
    }

    async fn split(&self, artifact: &Path, max_part_bytes: u64) -> PipelineResult<Vec<PathBuf>> {
        self.split_inner(artifact, max_part_bytes)
            .await
            .map_err(|e| PipelineError::split(e.to_string()))
    }
}

/// Build an output path next to `input` with a suffix appended to its stem.
fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_args_known() {
        assert!(preset_args("standard").unwrap().contains(&"libx264"));
        assert!(preset_args("fast").unwrap().contains(&"ultrafast"));
    }

    #[test]
    fn test_preset_args_unknown() {
        assert!(matches!(
            preset_args("bogus"),
            Err(MediaError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_sibling_path() {
        let out = sibling_path(Path::new("/work/clip.mp4"), "_out.mp4");
        assert_eq!(out, PathBuf::from("/work/clip_out.mp4"));
    }
}
