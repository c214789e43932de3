// Span Matcher
// Scans text against categorized detection patterns and reports match spans

use regex::Regex;

use crate::models::SpanMatch;

/// When a pattern takes part in a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Always,
    /// Skipped entirely when dates are configured to be kept.
    UnlessKeepDates,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub keep_dates: bool,
}

#[derive(Debug, Clone)]
pub struct DetectionPattern {
    pub category: String,
    pub regex: Regex,
    pub applicability: Applicability,
}

impl DetectionPattern {
    pub fn new(category: &str, pattern: &str, applicability: Applicability) -> Result<Self, regex::Error> {
        Ok(Self {
            category: category.to_string(),
            regex: Regex::new(pattern)?,
            applicability,
        })
    }

    pub fn applies(&self, opts: &ScanOptions) -> bool {
        match self.applicability {
            Applicability::Always => true,
            Applicability::UnlessKeepDates => !opts.keep_dates,
        }
    }

    pub fn find_spans(&self, text: &str) -> Vec<SpanMatch> {
        find_spans(&self.regex, text, &self.category)
    }
}

/// All non-empty, non-overlapping matches of `regex` in `text`, leftmost first.
pub fn find_spans(regex: &Regex, text: &str, tag: &str) -> Vec<SpanMatch> {
    regex
        .find_iter(text)
        .filter(|m| m.start() < m.end())
        .map(|m| SpanMatch {
            start: m.start(),
            end: m.end(),
            tag: tag.to_string(),
        })
        .collect()
}

/// Scan every applicable pattern over the same, unmodified text.
///
/// Spans from different categories may overlap; within one category they never do.
pub fn scan(text: &str, table: &[DetectionPattern], opts: &ScanOptions) -> Vec<SpanMatch> {
    table
        .iter()
        .filter(|p| p.applies(opts))
        .flat_map(|p| p.find_spans(text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<DetectionPattern> {
        vec![
            DetectionPattern::new("digits", r"\d{3}", Applicability::Always).unwrap(),
            DetectionPattern::new("date", r"\d{2}/\d{2}", Applicability::UnlessKeepDates).unwrap(),
        ]
    }

    #[test]
    fn test_find_spans_offsets() {
        let re = Regex::new(r"cat").unwrap();
        let spans = find_spans(&re, "a cat and a cat", "animal");
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start, spans[0].end), (2, 5));
        assert_eq!((spans[1].start, spans[1].end), (12, 15));
        assert_eq!(spans[0].tag, "animal");
    }

    #[test]
    fn test_empty_matches_are_dropped() {
        let re = Regex::new(r"x*").unwrap();
        assert!(find_spans(&re, "abc", "x").is_empty());
    }

    #[test]
    fn test_scan_honors_applicability() {
        let text = "seen 12/05 ref 123";
        let all = scan(text, &table(), &ScanOptions::default());
        assert!(all.iter().any(|s| s.tag == "date"));

        let kept = scan(text, &table(), &ScanOptions { keep_dates: true });
        assert!(kept.iter().all(|s| s.tag != "date"));
        assert_eq!(kept.len(), 1);
    }
}
