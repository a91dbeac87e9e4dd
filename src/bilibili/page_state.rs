//! Subtitle ids embedded in the public video page.
//!
//! The player API occasionally returns subtitle tracks belonging to a
//! different video. The page's `window.__INITIAL_STATE__` blob lists the ids
//! that really belong to this one.

use super::BilibiliClient;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn initial_state_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.+?\});").expect("Invalid regex")
    })
}

/// Pull subtitle ids out of the page HTML. `None` when the state blob is
/// missing or malformed.
pub fn subtitle_ids_from_html(html: &str) -> Option<Vec<String>> {
    let raw = initial_state_regex().captures(html)?.get(1)?.as_str();
    let state: Value = serde_json::from_str(raw).ok()?;

    let list = state
        .pointer("/videoData/subtitle/list")
        .and_then(Value::as_array)?;

    Some(list.iter().filter_map(track_id).collect())
}

fn track_id(track: &Value) -> Option<String> {
    if let Some(id) = track.get("id_str").and_then(Value::as_str) {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    match track.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Fetch the authoritative subtitle ids for `bvid`.
///
/// Never fails: any network or parse problem yields an empty list, which
/// callers treat as "no authoritative ids".
pub async fn fetch_subtitle_ids(client: &BilibiliClient, bvid: &str) -> Vec<String> {
    let url = client.web_url(&format!("/video/{bvid}"));

    let html = match client.http().get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read video page: {}", e);
                return Vec::new();
            }
        },
        Ok(response) => {
            warn!("Video page returned {}", response.status());
            return Vec::new();
        }
        Err(e) => {
            warn!("Failed to fetch video page: {}", e);
            return Vec::new();
        }
    };

    match subtitle_ids_from_html(&html) {
        Some(ids) => {
            debug!("Page lists {} subtitle ids: {:?}", ids.len(), ids);
            ids
        }
        None => {
            debug!("No initial state found on video page");
            Vec::new()
        }
    }
}
