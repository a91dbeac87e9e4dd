use super::SubtitleTrack;

const AI_SUBTITLE_PATH: &str = "/ai_subtitle/";

/// Keep the tracks that are fetchable and, when `authoritative` is non-empty,
/// whose id appears in it.
pub fn reconcile(tracks: &[SubtitleTrack], authoritative: &[String]) -> Vec<SubtitleTrack> {
    tracks
        .iter()
        .filter(|t| t.has_url())
        .filter(|t| authoritative.is_empty() || authoritative.iter().any(|id| *id == t.id))
        .cloned()
        .collect()
}

/// Pick the preferred track: `ai-zh`, then `zh-CN`, then any `zh*`, then any.
/// Within the first non-empty group an AI-subtitle URL wins, otherwise the
/// first track in the group.
pub fn select_best(tracks: &[SubtitleTrack]) -> Option<&SubtitleTrack> {
    let preferences: [fn(&SubtitleTrack) -> bool; 4] = [
        |t| t.language == "ai-zh",
        |t| t.language == "zh-CN",
        |t| t.language.starts_with("zh"),
        |_| true,
    ];

    preferences.iter().find_map(|matches| {
        let group: Vec<&SubtitleTrack> = tracks.iter().filter(|t| matches(t)).collect();
        group
            .iter()
            .find(|t| t.url.contains(AI_SUBTITLE_PATH))
            .or_else(|| group.first())
            .copied()
    })
}

/// Make protocol-relative URLs absolute.
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}
