//! Plain-text response formatting.
//!
//! The wire format is plain text, always: no parse mode is ever sent to
//! Telegram, so any markup an agent emits must be stripped before sending.
//! The sanitizer removes markdown tokens, HTML tags and entities, and
//! collapses whitespace while preserving line structure.

use std::sync::OnceLock;

use regex::Regex;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("static html-tag regex"))
}

/// Strip markup and normalize whitespace so the result is pure plain text.
pub fn sanitize_plain_text(raw: &str) -> String {
    // HTML tags first, then entities, then markdown tokens.
    let without_tags = html_tag_re().replace_all(raw, "");

    let decoded = without_tags
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    let without_markdown: String = decoded
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`'))
        .collect();

    collapse_whitespace(&without_markdown)
}

/// Collapse runs of spaces/tabs and limit blank-line runs to one.
fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0_usize;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run = blank_run.saturating_add(1);
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(collapsed);
    }

    // Trim leading/trailing blank lines.
    while lines.first().is_some_and(String::is_empty) {
        lines.remove(0);
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    lines.join("\n")
}
