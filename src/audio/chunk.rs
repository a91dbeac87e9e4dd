use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::error::{Result, SummaryError};

use super::{AudioChunk, MediaProcessor};

/// Default chunk length (10 minutes).
pub const DEFAULT_SEGMENT_DURATION: Duration = Duration::from_secs(600);

/// Trailing chunks shorter than this are likely rejected by hosted backends.
const SHORT_TAIL: Duration = Duration::from_secs(1);

/// Planned position of one chunk within the source audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub index: usize,
    pub start: Duration,
    pub duration: Duration,
}

/// Plan fixed-length chunks covering `total_duration`.
///
/// The last chunk only covers the remainder so that chunk durations sum to the
/// source duration.
pub fn plan_chunks(total_duration: Duration, segment_duration: Duration) -> Vec<ChunkPlan> {
    if segment_duration.is_zero() || total_duration.is_zero() {
        return Vec::new();
    }

    let count = (total_duration.as_secs_f64() / segment_duration.as_secs_f64()).ceil() as usize;

    let tail = total_duration.saturating_sub(segment_duration * (count - 1) as u32);
    if count > 1 && tail < SHORT_TAIL {
        warn!(
            "Last chunk covers only {:.3}s of audio and may be rejected by the backend",
            tail.as_secs_f64()
        );
    }

    (0..count)
        .map(|index| {
            let start = segment_duration * index as u32;
            let duration = if index + 1 == count {
                total_duration.saturating_sub(start)
            } else {
                segment_duration
            };
            ChunkPlan {
                index,
                start,
                duration,
            }
        })
        .collect()
}

/// Output path for chunk `index` of `source`: `{dir}/{stem}_part{index}{.ext}`.
fn chunk_path(source: &Path, index: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    dir.join(format!("{stem}_part{index}{ext}"))
}

/// Split `source` into chunks of at most `segment_duration`.
///
/// All chunks are extracted concurrently. If any extraction fails, every chunk
/// file is removed and the error is returned.
pub async fn split_audio<M>(
    media: &M,
    source: &Path,
    segment_duration: Duration,
) -> Result<Vec<AudioChunk>>
where
    M: MediaProcessor + ?Sized,
{
    if segment_duration.is_zero() {
        return Err(SummaryError::Config(
            "Chunk duration must be greater than 0".to_string(),
        ));
    }

    if !source.exists() {
        return Err(SummaryError::FileNotFound(source.display().to_string()));
    }

    let total = media.probe_duration(source).await?;
    let plans = plan_chunks(total, segment_duration);

    info!(
        "Splitting {} ({:.1}s) into {} chunks",
        source.display(),
        total.as_secs_f64(),
        plans.len()
    );

    let chunks: Vec<AudioChunk> = plans
        .iter()
        .map(|plan| AudioChunk {
            index: plan.index,
            path: chunk_path(source, plan.index),
            start: plan.start,
            duration: plan.duration,
        })
        .collect();

    let extractions = chunks.iter().map(|chunk| {
        debug!(
            "Extracting chunk {}: {:?} +{:?}",
            chunk.index, chunk.start, chunk.duration
        );
        media.trim(source, &chunk.path, chunk.start, chunk.duration)
    });

    if let Err(e) = try_join_all(extractions).await {
        warn!("Chunk extraction failed, discarding {} chunks", chunks.len());
        for chunk in &chunks {
            let _ = std::fs::remove_file(&chunk.path);
        }
        return Err(e);
    }

    Ok(chunks)
}
