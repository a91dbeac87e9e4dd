pub mod comment;
pub mod format;

pub use comment::format_summary_for_comment;
pub use format::{format_timestamp, format_transcript, truncate_transcript, TRUNCATION_MARKER};

use crate::bilibili::VideoInfo;
use crate::config::{Config, DEFAULT_CHAT_MODEL, DEFAULT_MAX_TRANSCRIPT_CHARS, DEFAULT_OPENAI_BASE_URL};
use crate::error::{Result, SummaryError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const EMPTY_SUMMARY: &str = "未能生成总结。";

const DESCRIPTION_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = r#"你是一个专业的视频内容总结助手。
你的任务是根据提供的 B 站视频元数据（标题、简介）和带时间戳的字幕内容，生成一份高质量的视频总结。

要求：
1. 摘要：用 2-3 句话概括视频的核心主题和主要内容。
2. 章节速览：列出视频的关键节点和主要观点。
   - 每个要点必须包含准确的时间戳（格式如 [02:15]）。
   - 时间戳应对应相关内容开始的时间。
   - 描述要简洁明了。
3. 风格：客观、清晰，便于用户快速获取信息。
4. 格式：直接生成适合 B 站评论区的纯文本，不要使用 Markdown 语法（如 ##、**、- 等）。
   - 标题使用【】包裹（如【摘要】）。
   - 列表项使用 "• " 开头。
   - 重点内容直接叙述，无需加粗。

示例输出：
【摘要】
本视频详细介绍了...

【关键要点】
• [00:30] 介绍了项目背景...
• [02:15] 详细演示了核心功能...
• [05:40] 总结了优缺点..."#;

/// Summarizes a flattened transcript through an OpenAI-compatible chat API.
pub struct Summarizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_chars: usize,
}

impl Summarizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| SummaryError::Config("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key)
            .with_base_url(config.openai_base_url.clone())
            .with_model(config.chat_model.clone())
            .with_max_chars(config.max_transcript_chars))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Character ceiling for the transcript sent to the model.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_user_message(&self, video: &VideoInfo, transcript: &str) -> String {
        let desc: String = video.desc.chars().take(DESCRIPTION_CHARS).collect();

        let total = transcript.chars().count();
        if total > self.max_chars {
            warn!(
                "Transcript too long ({} chars), truncating to {} chars",
                total, self.max_chars
            );
        }
        let content = truncate_transcript(transcript, self.max_chars);

        format!(
            "视频标题：{}\n视频简介：{}...\n\n字幕内容：\n{}",
            video.title, desc, content
        )
    }

    /// Generate a summary of `transcript`, a flattened `[mm:ss] text` listing.
    pub async fn summarize(&self, video: &VideoInfo, transcript: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: self.build_user_message(video, transcript),
                },
            ],
            temperature: 1.0,
        };

        debug!("Requesting summary from {} ({})", self.endpoint(), self.model);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(SummaryError::Api(format!(
                "Chat API error ({}): {}",
                status, message
            )));
        }

        let completion: ChatResponse = serde_json::from_str(&body)?;
        let summary = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| EMPTY_SUMMARY.to_string());

        Ok(summary)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    message: String,
}
