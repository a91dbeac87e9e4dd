use regex::Regex;
use std::sync::OnceLock;

struct CommentRules {
    heading: Regex,
    heading_tight: Regex,
    heading_gap: Regex,
    bullet: Regex,
    bold: Regex,
    blank_lines: Regex,
}

fn rules() -> &'static CommentRules {
    static RULES: OnceLock<CommentRules> = OnceLock::new();
    RULES.get_or_init(|| CommentRules {
        heading: Regex::new(r"(?m)^##\s+(.+)$").expect("Invalid regex"),
        heading_tight: Regex::new(r"(?m)^##(.+)$").expect("Invalid regex"),
        heading_gap: Regex::new(r"(?m)^\n+【").expect("Invalid regex"),
        bullet: Regex::new(r"(?m)^-\s+").expect("Invalid regex"),
        bold: Regex::new(r"\*\*(.*?)\*\*").expect("Invalid regex"),
        blank_lines: Regex::new(r"\n{3,}").expect("Invalid regex"),
    })
}

/// Turn a Markdown summary into plain text for a Bilibili comment.
///
/// `## X` headings become `【X】` on their own paragraph, `- ` bullets become
/// `• `, bold markers are dropped and runs of blank lines are collapsed.
pub fn format_summary_for_comment(summary: &str) -> String {
    let r = rules();
    let text = r.heading.replace_all(summary, "\n【${1}】");
    let text = r.heading_tight.replace_all(&text, "\n【${1}】");
    let text = r.heading_gap.replace_all(&text, "\n【");
    let text = r.bullet.replace_all(&text, "• ");
    let text = r.bold.replace_all(&text, "${1}");
    let text = r.blank_lines.replace_all(&text, "\n\n");
    text.trim().to_string()
}
