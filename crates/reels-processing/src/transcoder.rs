//! ffmpeg / ffprobe wrapper.

use async_trait::async_trait;
use reels_core::TranscodeSettings;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Longest stderr tail kept in an error message.
const STDERR_TAIL_BYTES: usize = 2000;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
}

/// Media engine used by the transcode worker.
#[async_trait]
pub trait TranscodeTool: Send + Sync {
    /// Encode `input` to a 720p H.264/AAC MP4 with faststart at `output`.
    async fn render_720p(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;

    /// Grab one JPEG frame at the one second mark.
    async fn extract_cover(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;

    /// Container duration in whole seconds. `None` when it can't be determined.
    async fn read_duration(&self, input: &Path) -> Option<i32>;
}

/// Runs the system `ffmpeg` and `ffprobe` binaries as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
}

impl FfmpegTool {
    pub fn new(settings: &TranscodeSettings) -> Self {
        Self {
            ffmpeg_path: settings.ffmpeg_path.clone(),
            ffprobe_path: settings.ffprobe_path.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Run `program` to completion. The child is killed if the timeout fires
    /// or the future is dropped.
    async fn run(&self, program: &str, args: &[String]) -> Result<Output, TranscodeError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|source| TranscodeError::Spawn {
                tool: program.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(TranscodeError::TimedOut {
                    tool: program.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                tool: program.to_string(),
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(output)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// ffprobe prints e.g. `12.480000`; truncate to whole seconds.
pub(crate) fn parse_duration(stdout: &str) -> Option<i32> {
    let seconds: f64 = stdout.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 || seconds > i32::MAX as f64 {
        return None;
    }
    Some(seconds.trunc() as i32)
}

pub(crate) fn rendition_args(input: &Path, output: &Path) -> Vec<String> {
    [
        "-y",
        "-i",
        path_arg(input).as_str(),
        "-vf",
        "scale=-2:720",
        "-c:v",
        "libx264",
        "-preset",
        "fast",
        "-crf",
        "23",
        "-c:a",
        "aac",
        "-movflags",
        "+faststart",
        path_arg(output).as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub(crate) fn cover_args(input: &Path, output: &Path) -> Vec<String> {
    [
        "-y",
        "-ss",
        "1",
        "-i",
        path_arg(input).as_str(),
        "-vframes",
        "1",
        "-q:v",
        "2",
        path_arg(output).as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub(crate) fn duration_args(input: &Path) -> Vec<String> {
    [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path_arg(input).as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[async_trait]
impl TranscodeTool for FfmpegTool {
    #[tracing::instrument(skip(self))]
    async fn render_720p(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.run(&self.ffmpeg_path, &rendition_args(input, output))
            .await
            .map(|_| ())
    }

    #[tracing::instrument(skip(self))]
    async fn extract_cover(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.run(&self.ffmpeg_path, &cover_args(input, output))
            .await
            .map(|_| ())
    }

    async fn read_duration(&self, input: &Path) -> Option<i32> {
        match self.run(&self.ffprobe_path, &duration_args(input)).await {
            Ok(output) => {
                let duration = parse_duration(&String::from_utf8_lossy(&output.stdout));
                if duration.is_none() {
                    tracing::warn!(input = %input.display(), "ffprobe returned no usable duration");
                }
                duration
            }
            Err(e) => {
                tracing::warn!(error = %e, input = %input.display(), "ffprobe failed, continuing without duration");
                None
            }
        }
    }
}
