//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg invocations.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    input_args: Vec<String>,
    output_args: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add an argument before `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an argument after `-i`.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek before decoding.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{seconds:.3}"))
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set a video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    fn build_args(&self, with_progress: bool) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
            "-y".to_string(),
        ];
        if with_progress {
            args.push("-progress".to_string());
            args.push("pipe:1".to_string());
            args.push("-nostats".to_string());
        }
        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Runs FFmpeg commands, optionally relaying encode progress.
pub struct FfmpegRunner;

impl FfmpegRunner {
    pub fn new() -> Self {
        Self
    }

    fn preflight() -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        Ok(())
    }

    /// Run to completion without progress reporting.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        Self::preflight()?;
        let args = cmd.build_args(false);
        debug!(args = ?args, "Running ffmpeg");

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfmpegFailed {
                message: format!("ffmpeg exited with {}", output.status),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
                exit_code: output.status.code(),
            });
        }
        Ok(())
    }

    /// Run while parsing `-progress pipe:1` output, invoking `on_percent`
    /// with the encode position relative to `total_duration_ms`.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        total_duration_ms: i64,
        mut on_percent: F,
    ) -> MediaResult<()>
    where
        F: FnMut(f64),
    {
        Self::preflight()?;
        let args = cmd.build_args(true);
        debug!(args = ?args, "Running ffmpeg with progress");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("no stdout from ffmpeg"))?;
        let mut lines = BufReader::new(stdout).lines();

        // Drain stderr concurrently; a full pipe buffer would stall the
        // child and with it the progress stream.
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_lines(stderr)));

        while let Some(line) = lines.next_line().await? {
            if let Some(value) = line.strip_prefix("out_time_ms=") {
                if let Ok(out_time_us) = value.trim().parse::<i64>() {
                    // ffmpeg reports microseconds under this key
                    let out_time_ms = out_time_us / 1000;
                    if total_duration_ms > 0 {
                        let pct = (out_time_ms as f64 / total_duration_ms as f64) * 100.0;
                        on_percent(pct.min(100.0));
                    }
                }
            } else if line.trim() == "progress=end" {
                on_percent(100.0);
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        if !status.success() {
            warn!(status = %status, "ffmpeg failed");
            return Err(MediaError::FfmpegFailed {
                message: format!("ffmpeg exited with {status}"),
                stderr: (!stderr.is_empty()).then_some(stderr),
                exit_code: status.code(),
            });
        }
        Ok(())
    }
}

/// Read a stream to exhaustion, keeping its lines.
async fn collect_lines<R>(reader: R) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_order() {
        let cmd = FfmpegCommand::new("/tmp/in.mp4", "/tmp/out.mp4")
            .seek(2.0)
            .video_filter("scale=480:-2");
        let args = cmd.build_args(false);

        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        assert!(ss_pos < i_pos);
        assert!(vf_pos > i_pos);
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[test]
    fn test_build_args_with_progress() {
        let cmd = FfmpegCommand::new("/tmp/in.mp4", "/tmp/out.mp4");
        let args = cmd.build_args(true);
        assert!(args.contains(&"-progress".to_string()));
        assert!(args.contains(&"pipe:1".to_string()));
    }

    #[tokio::test]
    async fn test_collect_lines_drains_large_streams() {
        let big = "frame dropped\n".repeat(10_000);
        let collected = collect_lines(big.as_bytes()).await;
        assert_eq!(collected, big);
    }
}
