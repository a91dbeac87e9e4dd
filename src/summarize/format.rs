//! Transcript flattening for the summarization prompt.
use crate::transcribe::TranscriptSegment;
use std::time::Duration;

pub const TRUNCATION_MARKER: &str = "\n...(content truncated)...";

/// `mm:ss`, or `hh:mm:ss` from one hour on.
pub fn format_timestamp(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// One `[timestamp] text` line per segment.
pub fn format_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|seg| format!("[{}] {}", format_timestamp(seg.start), seg.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to `max_chars` characters and append the truncation marker.
/// Text within the limit is returned unchanged.
pub fn truncate_transcript(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Duration::ZERO), "00:00");
        assert_eq!(format_timestamp(Duration::from_millis(135_900)), "02:15");
        assert_eq!(format_timestamp(Duration::from_secs(3599)), "59:59");
        assert_eq!(format_timestamp(Duration::from_secs(3661)), "01:01:01");
    }

    #[test]
    fn test_format_transcript() {
        let segments = vec![
            TranscriptSegment::from_secs(0.0, 2.0, "大家好"),
            TranscriptSegment::from_secs(65.4, 70.0, "今天聊聊 Rust"),
        ];
        assert_eq!(
            format_transcript(&segments),
            "[00:00] 大家好\n[01:05] 今天聊聊 Rust"
        );
    }

    #[test]
    fn test_format_transcript_empty() {
        assert_eq!(format_transcript(&[]), "");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "字".repeat(12);
        let truncated = truncate_transcript(&text, 10);
        assert_eq!(truncated, format!("{}{}", "字".repeat(10), TRUNCATION_MARKER));
        assert_eq!(truncated.matches(TRUNCATION_MARKER).count(), 1);
    }

    #[test]
    fn test_truncate_within_limit() {
        assert_eq!(truncate_transcript("abc", 3), "abc");
        assert_eq!(truncate_transcript("", 0), "");
    }
}
