pub mod audio;
pub mod bilibili;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod subtitle;
pub mod summarize;
pub mod transcribe;

pub use bilibili::{parse_input, BilibiliClient, VideoInfo, VideoRef};
pub use config::Config;
pub use error::{Result, StageExt, SummaryError};
pub use pipeline::{acquire_transcript, print_summary, PipelineOptions, Transcript, TranscriptSource};
pub use summarize::Summarizer;
pub use transcribe::{create_backend, TranscriptSegment, Transcriber, TranscriptionBackend};
