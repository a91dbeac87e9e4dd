use crate::audio::{split_audio, AudioChunk, MediaProcessor, TempFileGuard};
use crate::error::{Result, StageExt, SummaryError};
use crate::transcribe::{TranscriptSegment, Transcriber};
use futures::stream::{self, TryStreamExt};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Files at or above this size are split before transcription (24 MiB, below
/// the 25 MB limit of hosted providers).
pub const MAX_UPLOAD_BYTES: u64 = 24 * 1024 * 1024;

/// Transcribe `chunks` in order and merge them into one timeline.
///
/// Each chunk is transcribed at the sum of the declared durations of the
/// chunks before it. Chunk files are removed as soon as they are consumed,
/// and the remaining ones are removed if a chunk fails.
pub async fn assemble<T>(chunks: Vec<AudioChunk>, transcriber: &T) -> Result<Vec<TranscriptSegment>>
where
    T: Transcriber + ?Sized,
{
    let total = chunks.len();
    let guarded: Vec<_> = chunks
        .into_iter()
        .map(|chunk| {
            let guard = TempFileGuard::new(chunk.path.clone());
            Ok::<_, SummaryError>((chunk, guard))
        })
        .collect();

    let (offset, mut segments) = stream::iter(guarded)
        .try_fold(
            (Duration::ZERO, Vec::new()),
            |(offset, mut acc), (chunk, guard)| async move {
                info!(
                    "Transcribing chunk {}/{} at offset {:.1}s",
                    chunk.index + 1,
                    total,
                    offset.as_secs_f64()
                );
                let fragment = transcriber.transcribe(&chunk.path, offset).await?;
                debug!("Chunk {} produced {} segments", chunk.index, fragment.len());
                acc.extend(fragment);
                drop(guard);
                Ok::<_, SummaryError>((offset + chunk.duration, acc))
            },
        )
        .await?;

    segments.sort_by_key(|s| s.start);

    debug!(
        "Assembled {} segments covering {:.1}s",
        segments.len(),
        offset.as_secs_f64()
    );
    Ok(segments)
}

/// Transcribe a whole audio file, splitting it first when it is too large to
/// upload in one request.
pub async fn transcribe_file<T, M>(
    audio: &Path,
    transcriber: &T,
    media: &M,
    segment_duration: Duration,
) -> Result<Vec<TranscriptSegment>>
where
    T: Transcriber + ?Sized,
    M: MediaProcessor + ?Sized,
{
    let size = tokio::fs::metadata(audio)
        .await
        .map_err(|_| SummaryError::FileNotFound(audio.display().to_string()))?
        .len();

    if size < MAX_UPLOAD_BYTES {
        debug!("Transcribing {} in one request ({} bytes)", audio.display(), size);
        let mut segments = transcriber.transcribe(audio, Duration::ZERO).await?;
        segments.sort_by_key(|s| s.start);
        return Ok(segments);
    }

    info!(
        "Audio file too large ({:.2} MB), splitting...",
        size as f64 / (1024.0 * 1024.0)
    );
    let chunks = split_audio(media, audio, segment_duration)
        .await
        .stage("audio split")?;
    assemble(chunks, transcriber).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Returns one segment per call at chunk-local 1s..2s and records offsets.
    struct RecordingTranscriber {
        offsets: Mutex<Vec<Duration>>,
        fail_at: Option<usize>,
    }

    impl RecordingTranscriber {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                offsets: Mutex::new(Vec::new()),
                fail_at,
            }
        }
    }

    #[async_trait]
    impl Transcriber for RecordingTranscriber {
        async fn transcribe(&self, _audio: &Path, offset: Duration) -> Result<Vec<TranscriptSegment>> {
            let call = {
                let mut offsets = self.offsets.lock().unwrap();
                offsets.push(offset);
                offsets.len() - 1
            };
            if self.fail_at == Some(call) {
                return Err(SummaryError::Transcription("mock failure".to_string()));
            }
            Ok(vec![TranscriptSegment::from_secs(1.0, 2.0, format!("chunk {call}")).shifted(offset)])
        }

        fn name(&self) -> &'static str {
            "Recording"
        }
    }

    fn chunks_in(dir: &Path, durations: &[u64]) -> Vec<AudioChunk> {
        let mut start = Duration::ZERO;
        durations
            .iter()
            .enumerate()
            .map(|(index, secs)| {
                let path = dir.join(format!("a_part{index}.m4a"));
                std::fs::write(&path, b"chunk").unwrap();
                let chunk = AudioChunk {
                    index,
                    path,
                    start,
                    duration: Duration::from_secs(*secs),
                };
                start += chunk.duration;
                chunk
            })
            .collect()
    }

    #[tokio::test]
    async fn test_assemble_accumulates_declared_durations() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = chunks_in(dir.path(), &[600, 600, 30]);
        let transcriber = RecordingTranscriber::new(None);

        let segments = assemble(chunks, &transcriber).await.unwrap();

        let offsets = transcriber.offsets.lock().unwrap().clone();
        assert_eq!(
            offsets,
            vec![Duration::ZERO, Duration::from_secs(600), Duration::from_secs(1200)]
        );
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].start, Duration::from_secs(1201));
    }

    #[tokio::test]
    async fn test_assemble_removes_chunk_files() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = chunks_in(dir.path(), &[600, 10]);
        let paths: Vec<PathBuf> = chunks.iter().map(|c| c.path.clone()).collect();

        assemble(chunks, &RecordingTranscriber::new(None)).await.unwrap();

        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_assemble_failure_removes_remaining_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = chunks_in(dir.path(), &[600, 600, 600]);
        let paths: Vec<PathBuf> = chunks.iter().map(|c| c.path.clone()).collect();
        let transcriber = RecordingTranscriber::new(Some(1));

        let result = assemble(chunks, &transcriber).await;

        assert!(matches!(result, Err(SummaryError::Transcription(_))));
        assert_eq!(transcriber.offsets.lock().unwrap().len(), 2);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_assemble_empty() {
        let segments = assemble(Vec::new(), &RecordingTranscriber::new(None))
            .await
            .unwrap();
        assert!(segments.is_empty());
    }
}
