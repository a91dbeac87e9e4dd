use crate::error::{Result, SummaryError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model for summaries.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default model for the generic transcription backend.
pub const DEFAULT_AUDIO_MODEL: &str = "whisper-1";

/// Default Volcengine cluster.
pub const DEFAULT_VOLC_CLUSTER: &str = "volc_auc_common";

/// Transcript character ceiling before truncation.
pub const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 50_000;

/// Which speech-to-text provider the credentials select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Volc,
    Whisper,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Volc => write!(f, "volcengine"),
            Provider::Whisper => write!(f, "whisper"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub audio_model: String,
    pub volc_app_key: Option<String>,
    pub volc_access_key: Option<String>,
    pub volc_cluster: String,
    pub volc_api_url: Option<String>,
    pub bilibili_sessdata: Option<String>,
    pub bilibili_jct: Option<String>,
    pub max_transcript_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            audio_model: DEFAULT_AUDIO_MODEL.to_string(),
            volc_app_key: None,
            volc_access_key: None,
            volc_cluster: DEFAULT_VOLC_CLUSTER.to_string(),
            volc_api_url: None,
            bilibili_sessdata: None,
            bilibili_jct: None,
            max_transcript_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = get("OPENAI_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = get("OPENAI_AUDIO_MODEL") {
            self.audio_model = v;
        }
        if let Some(v) = get("VOLC_APP_KEY") {
            self.volc_app_key = Some(v);
        }
        if let Some(v) = get("VOLC_ACCESS_KEY") {
            self.volc_access_key = Some(v);
        }
        if let Some(v) = get("VOLC_CLUSTER") {
            self.volc_cluster = v;
        }
        if let Some(v) = get("VOLC_API_URL") {
            self.volc_api_url = Some(v);
        }
        if let Some(v) = get("BILIBILI_SESSDATA") {
            self.bilibili_sessdata = Some(v);
        }
        if let Some(v) = get("BILIBILI_JCT") {
            self.bilibili_jct = Some(v);
        }
        if let Some(v) = get("BILI_SUMMARY_MAX_CHARS") {
            if let Ok(n) = v.parse() {
                self.max_transcript_chars = n;
            }
        }
    }

    /// The transcription provider selected by the configured credentials.
    ///
    /// Volcengine wins when both of its keys are present.
    pub fn transcription_provider(&self) -> Option<Provider> {
        if self.volc_app_key.is_some() && self.volc_access_key.is_some() {
            Some(Provider::Volc)
        } else if self.openai_api_key.is_some() {
            Some(Provider::Whisper)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_none() {
            return Err(SummaryError::Config(
                "OPENAI_API_KEY not set. Pass --key or export OPENAI_API_KEY=sk-...".to_string(),
            ));
        }

        if self.max_transcript_chars == 0 {
            return Err(SummaryError::Config(
                "Transcript character limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bili-summary").join("config.toml"))
    }
}
