use super::select::{normalize_url, reconcile, select_best};
use super::{RawTrack, SubtitleTrack};
use crate::bilibili::{page_state, ApiEnvelope, BilibiliClient};
use crate::error::{Result, SummaryError};
use crate::transcribe::TranscriptSegment;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bounded retry for the player metadata request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayerData {
    subtitle: Option<PlayerSubtitles>,
}

#[derive(Debug, Deserialize)]
struct PlayerSubtitles {
    #[serde(default)]
    subtitles: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct SubtitleBody {
    #[serde(default)]
    body: Vec<SubtitleLine>,
}

#[derive(Debug, Deserialize)]
struct SubtitleLine {
    from: f64,
    to: f64,
    content: String,
}

/// Result of one player metadata request.
enum Attempt {
    Tracks(Vec<SubtitleTrack>),
    Empty,
}

/// Finds, validates and downloads the best subtitle track of a video.
pub struct SubtitleResolver<'a> {
    client: &'a BilibiliClient,
    policy: RetryPolicy,
}

impl<'a> SubtitleResolver<'a> {
    pub fn new(client: &'a BilibiliClient) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve the transcript carried by the video's subtitles.
    ///
    /// An empty result means the video has no usable subtitles. Only a
    /// failure to download the chosen track is an error.
    pub async fn resolve(&self, bvid: &str, cid: u64, aid: Option<u64>) -> Result<Vec<TranscriptSegment>> {
        let authoritative = page_state::fetch_subtitle_ids(self.client, bvid).await;
        if authoritative.is_empty() {
            debug!("No authoritative subtitle ids; skipping validation");
        }

        let Some(track) = self.find_track(bvid, cid, aid, &authoritative).await else {
            info!("No subtitles found for {}", bvid);
            return Ok(Vec::new());
        };

        if !track.has_url() {
            warn!("Selected subtitle track {} has no URL", track.id);
            return Ok(Vec::new());
        }

        info!("Using subtitle track {} ({})", track.id, track.language);
        self.fetch_content(&normalize_url(&track.url)).await
    }

    async fn find_track(
        &self,
        bvid: &str,
        cid: u64,
        aid: Option<u64>,
        authoritative: &[String],
    ) -> Option<SubtitleTrack> {
        let mut last_seen: Vec<SubtitleTrack> = Vec::new();

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.policy.delay).await;
            }

            let tracks = match self.fetch_tracks(bvid, cid, aid).await {
                Ok(Attempt::Tracks(tracks)) => tracks,
                Ok(Attempt::Empty) => {
                    debug!("Attempt {}: no subtitle tracks", attempt + 1);
                    continue;
                }
                Err(e) => {
                    warn!("Subtitle metadata request failed: {}", e);
                    return None;
                }
            };

            let candidates = reconcile(&tracks, authoritative);
            if let Some(best) = select_best(&candidates) {
                debug!("Attempt {}: matched track {}", attempt + 1, best.id);
                return Some(best.clone());
            }

            debug!(
                "Attempt {}: {} tracks, none valid for this video",
                attempt + 1,
                tracks.len()
            );
            last_seen = tracks;
        }

        if !last_seen.is_empty() {
            warn!("No validated subtitle track; falling back to last response");
        }
        select_best(&last_seen).cloned()
    }

    async fn fetch_tracks(&self, bvid: &str, cid: u64, aid: Option<u64>) -> Result<Attempt> {
        let mut query = vec![
            ("cid", cid.to_string()),
            ("bvid", bvid.to_string()),
        ];
        if let Some(aid) = aid {
            query.push(("aid", aid.to_string()));
        }
        query.push(("_", chrono::Utc::now().timestamp_millis().to_string()));
        query.push(("r", Uuid::new_v4().simple().to_string()));

        let envelope: ApiEnvelope<PlayerData> = self.client.get_envelope("/x/player/v2", &query).await?;

        if !envelope.is_ok() {
            debug!("Player API returned code {}: {}", envelope.code, envelope.message);
            return Ok(Attempt::Empty);
        }

        let tracks: Vec<SubtitleTrack> = envelope
            .data
            .and_then(|d| d.subtitle)
            .map(|s| s.subtitles.into_iter().map(SubtitleTrack::from).collect())
            .unwrap_or_default();

        if tracks.is_empty() {
            Ok(Attempt::Empty)
        } else {
            Ok(Attempt::Tracks(tracks))
        }
    }

    async fn fetch_content(&self, url: &str) -> Result<Vec<TranscriptSegment>> {
        let response = self
            .client
            .http()
            .get(url)
            .send()
            .await
            .map_err(|e| SummaryError::SubtitleContent(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::SubtitleContent(format!("{url}: HTTP {status}")));
        }

        let body: SubtitleBody = response
            .json()
            .await
            .map_err(|e| SummaryError::SubtitleContent(format!("{url}: {e}")))?;

        let mut segments: Vec<TranscriptSegment> = body
            .body
            .into_iter()
            .map(|line| TranscriptSegment::from_secs(line.from, line.to, line.content))
            .collect();
        segments.sort_by_key(|s| s.start);

        debug!("Fetched {} subtitle lines", segments.len());
        Ok(segments)
    }
}
