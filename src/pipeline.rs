use crate::audio::{MediaProcessor, DEFAULT_SEGMENT_DURATION};
use crate::bilibili::{BilibiliClient, VideoInfo};
use crate::error::{Result, StageExt, SummaryError};
use crate::subtitle::{RetryPolicy, SubtitleResolver};
use crate::transcribe::{transcribe_file, Transcriber, TranscriptSegment};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info};

/// Options for transcript acquisition.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Skip subtitles and always transcribe the audio.
    pub force_transcribe: bool,
    /// Retry policy for the subtitle metadata request.
    pub retry: RetryPolicy,
    /// Chunk length used when the audio is too large for one request.
    pub segment_duration: Duration,
    /// Show progress spinners.
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            force_transcribe: false,
            retry: RetryPolicy::default(),
            segment_duration: DEFAULT_SEGMENT_DURATION,
            show_progress: true,
        }
    }
}

/// Where a transcript came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptSource {
    Subtitles,
    Transcription { backend: &'static str },
}

/// A globally timestamped transcript, ordered by start time.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    pub source: TranscriptSource,
    pub elapsed: Duration,
}

fn spinner(progress: Option<&MultiProgress>, message: &str) -> Option<ProgressBar> {
    progress.map(|mp| {
        let pb = mp.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    })
}

fn finish(pb: Option<ProgressBar>, message: String) {
    if let Some(pb) = pb {
        pb.finish_with_message(message);
    }
}

/// Obtain the transcript of `video`: its subtitles when it has any, otherwise
/// a transcription of its audio track.
///
/// Returns `Ok(None)` when the video has no subtitles and no `transcriber`
/// was supplied. The downloaded audio lives in a temporary directory that is
/// removed before this function returns.
/// Scratch directory for the downloaded audio, removed when dropped.
fn download_dir(base: &Path) -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("bili-summary").tempdir_in(base)?)
}

pub async fn acquire_transcript<T, M>(
    client: &BilibiliClient,
    video: &VideoInfo,
    transcriber: Option<&T>,
    media: &M,
    options: &PipelineOptions,
) -> Result<Option<Transcript>>
where
    T: Transcriber + ?Sized,
    M: MediaProcessor + ?Sized,
{
    let started = Instant::now();
    let progress = options.show_progress.then(MultiProgress::new);

    if options.force_transcribe {
        info!("Forced transcription, skipping subtitles");
    } else {
        let pb = spinner(progress.as_ref(), "Fetching subtitles...");
        let segments = SubtitleResolver::new(client)
            .with_policy(options.retry)
            .resolve(&video.bvid, video.cid, Some(video.aid))
            .await
            .stage("subtitles")?;

        if !segments.is_empty() {
            finish(pb, format!("✓ Found {} subtitle lines", segments.len()));
            info!("Using {} subtitle lines", segments.len());
            return Ok(Some(Transcript {
                segments,
                source: TranscriptSource::Subtitles,
                elapsed: started.elapsed(),
            }));
        }
        finish(pb, "✗ No subtitles".to_string());
    }

    let Some(transcriber) = transcriber else {
        if options.force_transcribe {
            return Err(SummaryError::Config(
                "Transcription requested but no transcription backend is configured".to_string(),
            ));
        }
        return Ok(None);
    };

    let pb = spinner(progress.as_ref(), "Looking up audio stream...");
    let audio_url = client
        .audio_url(&video.bvid, video.cid)
        .await
        .stage("audio lookup")?
        .ok_or_else(|| {
            SummaryError::Api("No audio stream found for this video".to_string()).in_stage("audio lookup")
        })?;

    let temp_dir = download_dir(&std::env::temp_dir()).stage("audio download")?;
    let audio_path = temp_dir.path().join(format!("{}_{}.m4a", video.bvid, video.cid));
    debug!("Downloading audio to {}", audio_path.display());

    if let Some(ref pb) = pb {
        pb.set_message("Downloading audio...");
    }
    let bytes = client
        .download(&audio_url, &audio_path)
        .await
        .stage("audio download")?;
    finish(
        pb,
        format!("✓ Audio downloaded ({:.2} MB)", bytes as f64 / (1024.0 * 1024.0)),
    );

    let pb = spinner(
        progress.as_ref(),
        &format!("Transcribing with {}...", transcriber.name()),
    );
    let segments = transcribe_file(&audio_path, transcriber, media, options.segment_duration)
        .await
        .stage("transcription")?;
    finish(pb, format!("✓ Transcribed {} segments", segments.len()));

    info!(
        "Transcription complete: {} segments via {}",
        segments.len(),
        transcriber.name()
    );

    Ok(Some(Transcript {
        segments,
        source: TranscriptSource::Transcription {
            backend: transcriber.name(),
        },
        elapsed: started.elapsed(),
    }))
}

/// Print the finished summary with a banner.
pub fn print_summary(video: &VideoInfo, summary: &str) {
    let rule = "═".repeat(63);
    println!();
    println!("{}", style(&rule).cyan());
    println!("  {}", style(&video.title).bold());
    println!("  https://www.bilibili.com/video/{}", video.bvid);
    println!("{}", style(&rule).cyan());
    println!();
    println!("{}", summary);
    println!();
    println!("{}", style(&rule).cyan());
}
