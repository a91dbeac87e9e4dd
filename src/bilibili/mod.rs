pub mod page_state;

use crate::config::Config;
use crate::error::{Result, SummaryError};
use futures::StreamExt;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const API_BASE: &str = "https://api.bilibili.com";
pub const WEB_BASE: &str = "https://www.bilibili.com";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// `{code, message, data}` wrapper used by every Bilibili API response.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Metadata for one video part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub bvid: String,
    pub aid: u64,
    pub cid: u64,
    pub title: String,
    pub desc: String,
    pub pic: String,
    /// Seconds.
    pub duration: u64,
    pub pubdate: i64,
    pub total_pages: usize,
    pub current_page: u32,
}

#[derive(Debug, Deserialize)]
struct ViewData {
    bvid: String,
    aid: u64,
    cid: u64,
    title: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    pic: String,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    pubdate: i64,
    #[serde(default)]
    pages: Vec<PageData>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    cid: u64,
    page: u32,
    #[serde(default)]
    part: String,
    #[serde(default)]
    duration: u64,
}

impl ViewData {
    /// Resolve the requested part. `page` is clamped to the available range.
    fn into_video_info(self, page: u32) -> VideoInfo {
        let mut info = VideoInfo {
            bvid: self.bvid,
            aid: self.aid,
            cid: self.cid,
            title: self.title,
            desc: self.desc,
            pic: self.pic,
            duration: self.duration,
            pubdate: self.pubdate,
            total_pages: 1,
            current_page: 1,
        };

        if self.pages.is_empty() {
            return info;
        }

        let total = self.pages.len();
        let target = page.clamp(1, total as u32);
        info.total_pages = total;
        info.current_page = target;

        if let Some(part) = self.pages.iter().find(|p| p.page == target) {
            info.cid = part.cid;
            if total > 1 {
                info.title = format!("{} - P{} {}", info.title, target, part.part);
                info.duration = part.duration;
            }
        }

        info
    }
}

#[derive(Debug, Deserialize)]
struct PlayUrlData {
    dash: Option<DashData>,
}

#[derive(Debug, Deserialize)]
struct DashData {
    #[serde(default)]
    audio: Vec<DashStream>,
}

#[derive(Debug, Deserialize)]
struct DashStream {
    #[serde(rename = "baseUrl", alias = "base_url")]
    base_url: String,
}

/// A video reference parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub bvid: String,
    pub page: u32,
}

/// Extract the BV id and `p=` page from a bare id or a video URL.
pub fn parse_input(input: &str) -> Option<VideoRef> {
    static BVID: OnceLock<Regex> = OnceLock::new();
    static PAGE: OnceLock<Regex> = OnceLock::new();

    let bvid_re = BVID.get_or_init(|| Regex::new(r"(BV[a-zA-Z0-9]{10})").expect("Invalid regex"));
    let page_re = PAGE.get_or_init(|| Regex::new(r"[?&]p=(\d+)").expect("Invalid regex"));

    let bvid = bvid_re.captures(input)?.get(1)?.as_str().to_string();
    let page = page_re
        .captures(input)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);

    Some(VideoRef { bvid, page })
}

/// HTTP client for the Bilibili web APIs.
#[derive(Debug, Clone)]
pub struct BilibiliClient {
    client: reqwest::Client,
    api_base: String,
    web_base: String,
    csrf: Option<String>,
}

impl BilibiliClient {
    /// Create a client; `sessdata` is sent as the `SESSDATA` cookie.
    pub fn new(sessdata: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static(WEB_BASE));
        if let Some(sessdata) = sessdata {
            let cookie = HeaderValue::from_str(&format!("SESSDATA={sessdata}"))
                .map_err(|e| SummaryError::Config(format!("Invalid BILIBILI_SESSDATA: {e}")))?;
            headers.insert(COOKIE, cookie);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            web_base: WEB_BASE.to_string(),
            csrf: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new(config.bilibili_sessdata.as_deref())?;
        client.csrf = config.bilibili_jct.clone();
        Ok(client)
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_web_base(mut self, url: impl Into<String>) -> Self {
        self.web_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// CSRF token (`bili_jct` cookie) required for posting comments.
    pub fn with_csrf(mut self, csrf: impl Into<String>) -> Self {
        self.csrf = Some(csrf.into());
        self
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub(crate) fn web_url(&self, path: &str) -> String {
        format!("{}{}", self.web_base, path)
    }

    pub(crate) async fn get_envelope<T, Q>(&self, path: &str, query: &Q) -> Result<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .client
            .get(self.api_url(path))
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch metadata for a video, selecting part `page` (1-based).
    pub async fn video_info(&self, bvid: &str, page: u32) -> Result<VideoInfo> {
        let envelope: ApiEnvelope<ViewData> = self
            .get_envelope("/x/web-interface/view", &[("bvid", bvid)])
            .await?;

        if !envelope.is_ok() {
            return Err(SummaryError::Api(format!(
                "Failed to get video info: {} (code {})",
                envelope.message, envelope.code
            )));
        }

        let data = envelope
            .data
            .ok_or_else(|| SummaryError::Api("Video info response has no data".to_string()))?;

        Ok(data.into_video_info(page))
    }

    /// URL of the first DASH audio stream, or `None` when the video has none.
    pub async fn audio_url(&self, bvid: &str, cid: u64) -> Result<Option<String>> {
        let cid = cid.to_string();
        let envelope: ApiEnvelope<PlayUrlData> = self
            .get_envelope(
                "/x/player/playurl",
                &[("bvid", bvid), ("cid", cid.as_str()), ("fnval", "16")],
            )
            .await?;

        if !envelope.is_ok() {
            warn!("PlayUrl API warning: {}", envelope.message);
            return Ok(None);
        }

        Ok(envelope
            .data
            .and_then(|d| d.dash)
            .and_then(|d| d.audio.into_iter().next())
            .map(|s| s.base_url))
    }

    /// Stream `url` into `output`, returning the number of bytes written.
    pub async fn download(&self, url: &str, output: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(output).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} bytes to {}", written, output.display());
        Ok(written)
    }

    /// Post `message` as a top-level comment on video `aid`.
    pub async fn post_comment(&self, aid: u64, message: &str) -> Result<()> {
        let csrf = self.csrf.as_deref().ok_or_else(|| {
            SummaryError::Config(
                "BILIBILI_JCT (CSRF token) is required to post comments".to_string(),
            )
        })?;

        let oid = aid.to_string();
        let form = [
            ("type", "1"),
            ("oid", oid.as_str()),
            ("message", message),
            ("csrf", csrf),
        ];

        let envelope: ApiEnvelope<serde_json::Value> = self
            .client
            .post(self.api_url("/x/v2/reply/add"))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.is_ok() {
            return Err(SummaryError::Api(format!(
                "Failed to post comment: {} (code {})",
                envelope.message, envelope.code
            )));
        }

        info!("Comment posted on av{}", aid);
        Ok(())
    }
}
