// Span Highlighter
// Non-overlapping severity spans over report text, for presentation only

use crate::models::NonOverlappingSpans;
use crate::services::risk::severity_patterns;
use crate::services::span_matcher::{scan, ScanOptions};

/// All severity matches across both groups, resolved greedily to a non-overlapping set.
pub fn resolve(text: &str) -> NonOverlappingSpans {
    if text.trim().is_empty() {
        return NonOverlappingSpans::default();
    }
    NonOverlappingSpans::resolve(scan(text, severity_patterns(), &ScanOptions::default()))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escaped HTML with each resolved span wrapped as
/// `<span class="hl-{severity}"><b>…</b></span>`.
pub fn render_highlight_html(text: &str) -> String {
    let spans = resolve(text);
    if text.trim().is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(text.len() + spans.len() * 40);
    let mut cursor = 0usize;
    for span in spans.iter() {
        out.push_str(&escape_html(&text[cursor..span.start]));
        out.push_str(&format!(
            "<span class=\"hl-{}\"><b>{}</b></span>",
            span.tag,
            escape_html(&text[span.start..span.end])
        ));
        cursor = span.end;
    }
    out.push_str(&escape_html(&text[cursor..]));
    out
}
