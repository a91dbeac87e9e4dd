pub mod resolver;
pub mod select;

pub use resolver::{RetryPolicy, SubtitleResolver};
pub use select::{normalize_url, reconcile, select_best};

use serde::Deserialize;

/// A subtitle track advertised by the player API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub id: String,
    /// Language tag, e.g. `ai-zh`, `zh-CN`, `en`.
    pub language: String,
    /// Content URL; may be protocol-relative or empty.
    pub url: String,
}

impl SubtitleTrack {
    pub fn new(id: impl Into<String>, language: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            url: url.into(),
        }
    }

    pub fn has_url(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTrack {
    #[serde(default)]
    id: Option<serde_json::Number>,
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default)]
    lan: String,
    #[serde(default)]
    subtitle_url: String,
}

impl From<RawTrack> for SubtitleTrack {
    fn from(raw: RawTrack) -> Self {
        let id = raw
            .id_str
            .filter(|s| !s.is_empty())
            .or_else(|| raw.id.map(|n| n.to_string()))
            .unwrap_or_default();
        SubtitleTrack {
            id,
            language: raw.lan,
            url: raw.subtitle_url,
        }
    }
}
