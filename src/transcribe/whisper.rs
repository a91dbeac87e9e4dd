use crate::config::{DEFAULT_AUDIO_MODEL, DEFAULT_OPENAI_BASE_URL};
use crate::error::{Result, SummaryError};
use crate::transcribe::{secs, TranscriptSegment, Transcriber};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// OpenAI-compatible speech-to-text client.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl WhisperClient {
    /// Create a new Whisper client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_AUDIO_MODEL.to_string(),
        }
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }

    /// Build the multipart form for the API request.
    async fn build_form(&self, audio_path: &Path) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.m4a")
            .to_string();

        let mime_type = match audio_path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") | Some("m4s") | Some("mp4") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "application/octet-stream",
        };

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_type)?;

        Ok(Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment"))
    }

    async fn call_api(&self, form: Form) -> Result<WhisperResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        let body = response.text().await?;

        if status.is_success() {
            debug!("Whisper API response: {}", truncate_for_log(&body));
            return Ok(serde_json::from_str(&body)?);
        }

        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(SummaryError::Transcription(format!(
                "Whisper API error ({}): {}",
                status, api_error.error.message
            )));
        }

        Err(SummaryError::Transcription(format!(
            "Whisper API error ({}): {}",
            status, body
        )))
    }

    /// Convert a Whisper response into segments shifted by `offset`.
    fn parse_response(response: WhisperResponse, offset: Duration) -> Vec<TranscriptSegment> {
        match response.segments {
            Some(segments) => segments
                .into_iter()
                .map(|seg| {
                    TranscriptSegment::from_secs(seg.start, seg.end, seg.text.trim()).shifted(offset)
                })
                .collect(),
            None => {
                let duration = response.duration.map(secs).unwrap_or_default();
                vec![TranscriptSegment {
                    start: offset,
                    end: offset + duration,
                    text: response.text.trim().to_string(),
                }]
            }
        }
    }
}

fn truncate_for_log(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &Path, offset: Duration) -> Result<Vec<TranscriptSegment>> {
        debug!("Transcribing {} with Whisper at offset {:?}", audio.display(), offset);

        let form = self.build_form(audio).await?;
        let response = self.call_api(form).await?;
        let segments = Self::parse_response(response, offset);

        debug!("Whisper returned {} segments", segments.len());
        Ok(segments)
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
