use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SummaryError};

use super::MediaProcessor;

/// Check if FFmpeg is installed and accessible.
pub async fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg").await
}

/// Check if FFprobe is installed and accessible.
pub async fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe").await
}

async fn check_tool(tool: &str) -> Result<()> {
    let output = Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            SummaryError::AudioExtraction(format!(
                "{tool} not found. Install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(SummaryError::AudioExtraction(format!(
            "{tool} check failed"
        )));
    }

    debug!("{} is available", tool);
    Ok(())
}

/// Parse the single-value output of `ffprobe -show_entries format=duration`.
fn parse_duration_output(stdout: &str) -> Result<Duration> {
    let trimmed = stdout.trim();
    let secs: f64 = trimmed.parse().map_err(|e| {
        SummaryError::AudioExtraction(format!("Failed to parse duration '{trimmed}': {e}"))
    })?;

    Duration::try_from_secs_f64(secs).map_err(|e| {
        SummaryError::AudioExtraction(format!("Invalid duration '{trimmed}': {e}"))
    })
}

/// [`MediaProcessor`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone, Default)]
pub struct Ffmpeg;

#[async_trait]
impl MediaProcessor for Ffmpeg {
    async fn probe_duration(&self, path: &Path) -> Result<Duration> {
        if !path.exists() {
            return Err(SummaryError::FileNotFound(path.display().to_string()));
        }

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| SummaryError::AudioExtraction(format!("Failed to run FFprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SummaryError::AudioExtraction(format!(
                "FFprobe failed: {stderr}"
            )));
        }

        parse_duration_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start: Duration,
        duration: Duration,
    ) -> Result<()> {
        if duration.is_zero() {
            return Err(SummaryError::AudioExtraction(
                "Segment duration is zero".to_string(),
            ));
        }

        let start_secs = format!("{:.3}", start.as_secs_f64());
        let duration_secs = format!("{:.3}", duration.as_secs_f64());

        debug!(
            "Trimming {}: start={}, duration={} -> {}",
            input.display(),
            start_secs,
            duration_secs,
            output.display()
        );

        let result = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-ss"])
            .arg(&start_secs)
            .arg("-t")
            .arg(&duration_secs)
            .arg("-i")
            .arg(input)
            .args(["-vn", "-c:a", "copy"])
            .arg(output)
            .stdout(Stdio::null())
            .output()
            .await
            .map_err(|e| SummaryError::AudioExtraction(format!("Failed to run FFmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(SummaryError::AudioExtraction(format!(
                "FFmpeg segment extraction failed for {}: {}",
                output.display(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}
