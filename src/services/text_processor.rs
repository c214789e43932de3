// Text Processing Service
// Whitespace normalization, rule-based sentence splitting and language guessing

use regex::Regex;
use std::sync::OnceLock;

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex must compile"))
}

fn horizontal_ws() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"[ \t]+")
}

fn ws_around_newline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\s*\n\s*")
}

fn any_ws() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\s+")
}

fn terminal_punct_ws() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"([.!?])\s+")
}

/// Normalize punctuation and line endings in extracted document text
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{2014}', "-")
        .replace(['\u{00A0}', '\u{3000}'], " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let s = horizontal_ws().replace_all(&s, " ");
    s.lines().map(|ln| ln.trim()).collect::<Vec<_>>().join("\n").trim().to_string()
}

/// Collapse horizontal runs to one space and squeeze blank lines, then trim.
pub fn reduce_whitespace(text: &str) -> String {
    let s = horizontal_ws().replace_all(text, " ");
    let s = ws_around_newline().replace_all(&s, "\n");
    s.trim().to_string()
}

/// Collapse every whitespace run (newlines included) to one space, then trim.
pub fn collapse_whitespace(text: &str) -> String {
    any_ws().replace_all(text, " ").trim().to_string()
}

/// Split after `.`, `!` or `?` when followed by whitespace.
pub fn split_on_terminal_punct(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }

    // Rust regex doesn't support lookbehind, mark the boundary and split on the marker
    let marked = terminal_punct_ws().replace_all(text, "$1\x00");
    marked
        .split('\x00')
        .filter(|p| !p.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when the boundary candidate right before `k` closes an abbreviation:
/// `e.g.`-style dotted pairs, `Dr.`-style titles, or a single-capital initial.
fn closes_abbreviation(chars: &[char], k: usize) -> bool {
    if k >= 4 && is_word(chars[k - 4]) && chars[k - 3] == '.' && is_word(chars[k - 2]) {
        return true;
    }
    if k >= 3 && chars[k - 3].is_ascii_uppercase() && chars[k - 2].is_ascii_lowercase() && chars[k - 1] == '.' {
        return true;
    }
    k >= 2
        && chars[k - 1] == '.'
        && chars[k - 2].is_ascii_uppercase()
        && (k == 2 || !is_word(chars[k - 3]))
}

/// Regex-style sentence fallback used when no trained boundary detector is available.
///
/// Splits on the single whitespace character following `.` or `?`, except after
/// common abbreviation shapes. Fragments of one character or less are dropped.
pub fn split_sentences_rule_based(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut pieces: Vec<String> = Vec::new();
    let mut start = 0usize;

    for k in 1..chars.len() {
        if !chars[k].is_whitespace() || !matches!(chars[k - 1], '.' | '?') {
            continue;
        }
        if closes_abbreviation(&chars, k) {
            continue;
        }
        pieces.push(chars[start..k].iter().collect());
        start = k + 1;
    }
    if start < chars.len() {
        pieces.push(chars[start..].iter().collect());
    }

    pieces
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| p.chars().count() > 1)
        .collect()
}

const LATIN_STOPWORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "of", "with", "is", "no", "there", "are", "in", "to"]),
    ("de", &["der", "die", "und", "mit", "ist", "kein", "keine", "nicht", "im", "das"]),
    ("fr", &["le", "la", "les", "et", "des", "avec", "est", "pas", "une", "du"]),
    ("es", &["el", "los", "las", "y", "con", "es", "sin", "una", "del", "se"]),
    ("it", &["il", "gli", "e", "con", "non", "una", "della", "sono", "nel", "di"]),
];

/// Best-effort language code from script ratios and common function words.
///
/// Returns `None` when the text has no letters at all.
pub fn detect_language(text: &str) -> Option<String> {
    let mut letters = 0usize;
    let mut cjk = 0usize;
    let mut cyrillic = 0usize;
    let mut arabic = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        match c {
            '\u{4e00}'..='\u{9fff}' => cjk += 1,
            '\u{0400}'..='\u{04ff}' => cyrillic += 1,
            '\u{0600}'..='\u{06ff}' => arabic += 1,
            _ => {}
        }
    }
    if letters == 0 {
        return None;
    }

    let dominant = |n: usize| n * 2 > letters;
    if dominant(cjk) {
        return Some("zh".to_string());
    }
    if dominant(cyrillic) {
        return Some("ru".to_string());
    }
    if dominant(arabic) {
        return Some("ar".to_string());
    }

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    let mut best = ("en", 0usize);
    for (code, stopwords) in LATIN_STOPWORDS {
        let hits = words.iter().filter(|w| stopwords.contains(&w.as_str())).count();
        if hits > best.1 {
            best = (code, hits);
        }
    }
    Some(best.0.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "\u{201c}Mass\u{201d}\u{00A0}noted \u{2014} see\r\nreport  ";
        assert_eq!(normalize_punctuation(input), "\"Mass\" noted - see\nreport");
    }

    #[test]
    fn test_reduce_whitespace() {
        assert_eq!(reduce_whitespace("Line 1   \n\n   Line 2"), "Line 1\nLine 2");
        assert_eq!(reduce_whitespace("  a \t b  "), "a b");
        assert_eq!(reduce_whitespace(""), "");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a\n\n b\tc "), "a b c");
    }

    #[test]
    fn test_split_on_terminal_punct() {
        let parts = split_on_terminal_punct("No mass. Clear lungs!  Stable? yes");
        assert_eq!(parts, vec!["No mass.", "Clear lungs!", "Stable?", "yes"]);
        assert!(split_on_terminal_punct("").is_empty());
    }

    #[test]
    fn test_rule_based_split() {
        let s = split_sentences_rule_based("The lungs are clear. No effusion is seen. Dr. Smith reviewed.");
        assert_eq!(s, vec!["The lungs are clear.", "No effusion is seen.", "Dr. Smith reviewed."]);
    }

    #[test]
    fn test_rule_based_split_keeps_abbreviations() {
        let s = split_sentences_rule_based("Findings e.g. mild edema. Seen by J. Doe today.");
        assert_eq!(s, vec!["Findings e.g. mild edema.", "Seen by J. Doe today."]);
    }

    #[test]
    fn test_rule_based_split_drops_tiny_fragments() {
        let s = split_sentences_rule_based("Normal study. . x");
        assert_eq!(s, vec!["Normal study."]);
        assert!(split_sentences_rule_based("   \n ").is_empty());
    }

    #[test]
    fn test_rule_based_split_is_stable_when_rejoined() {
        let first = split_sentences_rule_based("No acute findings. Heart size normal. Is there effusion? No.");
        let second = split_sentences_rule_based(&first.join(" "));
        assert_eq!(first, second);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("There is no effusion and the heart is normal.").as_deref(), Some("en"));
        assert_eq!(detect_language("Die Lunge ist frei, kein Erguss und keine Infiltrate.").as_deref(), Some("de"));
        assert_eq!(detect_language("胸部未见明显异常").as_deref(), Some("zh"));
        assert_eq!(detect_language("12345 !!"), None);
    }
}
