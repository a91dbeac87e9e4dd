pub mod assembler;
pub mod volc;
pub mod whisper;

pub use assembler::{assemble, transcribe_file, MAX_UPLOAD_BYTES};
pub use volc::VolcClient;
pub use whisper::WhisperClient;

use crate::config::{Config, Provider};
use crate::error::{Result, SummaryError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// One timed line of transcript text.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl TranscriptSegment {
    /// Build a segment from wire seconds. Negative or non-finite times become
    /// zero and `end` is raised to `start` when it precedes it.
    pub fn from_secs(start: f64, end: f64, text: impl Into<String>) -> Self {
        let start = secs(start);
        let end = secs(end).max(start);
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Shift both timestamps by `offset`.
    pub fn shifted(mut self, offset: Duration) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

/// Convert wire seconds to a `Duration`, clamping invalid values to zero.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio`; returned timestamps are shifted by
    /// `offset`.
    async fn transcribe(&self, audio: &Path, offset: Duration) -> Result<Vec<TranscriptSegment>>;
    fn name(&self) -> &'static str;
}

/// The speech-to-text backend selected from configuration.
pub enum TranscriptionBackend {
    Volc(VolcClient),
    Whisper(WhisperClient),
}

#[async_trait]
impl Transcriber for TranscriptionBackend {
    async fn transcribe(&self, audio: &Path, offset: Duration) -> Result<Vec<TranscriptSegment>> {
        match self {
            TranscriptionBackend::Volc(client) => client.transcribe(audio, offset).await,
            TranscriptionBackend::Whisper(client) => client.transcribe(audio, offset).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TranscriptionBackend::Volc(client) => client.name(),
            TranscriptionBackend::Whisper(client) => client.name(),
        }
    }
}

/// Create the transcription backend the configured credentials select.
pub fn create_backend(config: &Config) -> Result<TranscriptionBackend> {
    match config.transcription_provider() {
        Some(Provider::Volc) => {
            let (Some(app_key), Some(access_key)) = (&config.volc_app_key, &config.volc_access_key)
            else {
                return Err(SummaryError::Config(
                    "VOLC_APP_KEY and VOLC_ACCESS_KEY must both be set".to_string(),
                ));
            };
            let mut client = VolcClient::new(app_key.clone(), access_key.clone())
                .with_cluster(config.volc_cluster.clone());
            if let Some(ref url) = config.volc_api_url {
                client = client.with_endpoint(url.clone());
            }
            Ok(TranscriptionBackend::Volc(client))
        }
        Some(Provider::Whisper) => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                SummaryError::Config("OPENAI_API_KEY not set".to_string())
            })?;
            Ok(TranscriptionBackend::Whisper(
                WhisperClient::new(api_key)
                    .with_base_url(config.openai_base_url.clone())
                    .with_model(config.audio_model.clone()),
            ))
        }
        None => Err(SummaryError::Config(
            "No transcription credentials. Set VOLC_APP_KEY and VOLC_ACCESS_KEY, or OPENAI_API_KEY."
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_from_secs_clamps() {
        let seg = TranscriptSegment::from_secs(-1.0, -2.0, "x");
        assert_eq!(seg.start, Duration::ZERO);
        assert_eq!(seg.end, Duration::ZERO);

        let seg = TranscriptSegment::from_secs(5.0, 3.0, "y");
        assert_eq!(seg.start, Duration::from_secs(5));
        assert_eq!(seg.end, Duration::from_secs(5));

        let seg = TranscriptSegment::from_secs(f64::NAN, 1.5, "z");
        assert_eq!(seg.start, Duration::ZERO);
        assert_eq!(seg.end, Duration::from_millis(1500));
    }

    #[test]
    fn test_segment_shifted() {
        let seg = TranscriptSegment::from_secs(5.0, 8.0, "hi").shifted(Duration::from_secs(600));
        assert_eq!(seg.start, Duration::from_secs(605));
        assert_eq!(seg.end, Duration::from_secs(608));
    }

    #[test]
    fn test_create_backend_prefers_volc() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            volc_app_key: Some("app".to_string()),
            volc_access_key: Some("token".to_string()),
            ..Default::default()
        };
        let backend = create_backend(&config).unwrap();
        assert!(matches!(backend, TranscriptionBackend::Volc(_)));
        assert_eq!(backend.name(), "Volcengine ASR");
    }

    #[test]
    fn test_create_backend_whisper() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "OpenAI Whisper");
    }

    #[test]
    fn test_create_backend_without_credentials() {
        let result = create_backend(&Config::default());
        assert!(matches!(result, Err(SummaryError::Config(_))));
    }
}
