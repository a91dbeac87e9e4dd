pub mod chunk;
pub mod extract;

pub use chunk::{plan_chunks, split_audio, ChunkPlan, DEFAULT_SEGMENT_DURATION};
pub use extract::{check_ffmpeg, check_ffprobe, Ffmpeg};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A slice of a source audio file produced for size-limited transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub index: usize,
    pub path: PathBuf,
    pub start: Duration,
    pub duration: Duration,
}

impl AudioChunk {
    /// End of this chunk within the source audio.
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Probing and trimming of media files.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Total duration of the media at `path`.
    async fn probe_duration(&self, path: &Path) -> Result<Duration>;

    /// Write `duration` of `input` starting at `start` to `output`.
    async fn trim(&self, input: &Path, output: &Path, start: Duration, duration: Duration)
        -> Result<()>;
}

/// Removes the file at `path` when dropped. Removal errors are ignored.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temp file {}", self.path.display()),
            Err(e) => debug!("Could not remove temp file {}: {}", self.path.display(), e),
        }
    }
}
