// PHI Anonymizer
// Sequential per-category redaction over a mutable text buffer

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use super::patterns::phi_table;
use crate::models::{PhiCounts, SpanMatch};
use crate::services::config_store::{AnonymizerConfig, RedactionKind};
use crate::services::span_matcher::{DetectionPattern, ScanOptions};
use crate::services::text_processor::reduce_whitespace;

/// Masks never get shorter than this, whatever the original length.
pub const MASK_MIN_WIDTH: usize = 6;
/// Hex characters kept from the salted digest.
pub const HASH_TOKEN_HEX_LEN: usize = 10;

#[derive(Error, Debug)]
pub enum AnonymizerError {
    #[error("invalid PHI pattern for category '{category}': {source}")]
    InvalidPattern {
        category: String,
        #[source]
        source: regex::Error,
    },
    #[error("PHI pattern '{pattern}' has an empty category")]
    EmptyCategory { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedactionStrategy {
    Mask { mask_char: char },
    Hash { salt: String },
}

impl RedactionStrategy {
    pub fn from_config(config: &AnonymizerConfig) -> Self {
        match config.strategy {
            RedactionKind::Mask => Self::Mask {
                mask_char: config.mask_char,
            },
            RedactionKind::Hash => Self::Hash {
                salt: config.hash_salt.clone(),
            },
        }
    }

    pub fn redact(&self, token: &str) -> String {
        match self {
            Self::Mask { mask_char } => mask_token(*mask_char, token),
            Self::Hash { salt } => hash_token(salt, token),
        }
    }
}

/// `<ID:xxxxxxxxxx>`: first hex chars of SHA-256(salt + token).
pub fn hash_token(salt: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(token.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("<ID:{}>", &digest[..HASH_TOKEN_HEX_LEN])
}

pub fn mask_token(mask_char: char, token: &str) -> String {
    let width = token.chars().count().max(MASK_MIN_WIDTH);
    std::iter::repeat(mask_char).take(width).collect()
}

pub struct Anonymizer {
    patterns: Vec<DetectionPattern>,
    strategy: RedactionStrategy,
    reduce_whitespace: bool,
    scan: ScanOptions,
}

impl Anonymizer {
    pub fn new(config: &AnonymizerConfig) -> Result<Self, AnonymizerError> {
        Ok(Self {
            patterns: phi_table(&config.extra_patterns)?,
            strategy: RedactionStrategy::from_config(config),
            reduce_whitespace: config.reduce_whitespace,
            scan: ScanOptions {
                keep_dates: config.keep_dates,
            },
        })
    }

    pub fn strategy(&self) -> &RedactionStrategy {
        &self.strategy
    }

    /// Redact PHI and count redactions per category.
    ///
    /// Categories run in table order, each over the buffer left by the
    /// previous one, so a later category can match inside an earlier
    /// replacement token. Counts are taken on the text each pass received.
    pub fn anonymize(&self, text: &str) -> (String, PhiCounts) {
        let mut counts = PhiCounts::new();
        if text.is_empty() {
            return (String::new(), counts);
        }

        let mut out = text.to_string();
        for pattern in self.patterns.iter().filter(|p| p.applies(&self.scan)) {
            let spans = pattern.find_spans(&out);
            if spans.is_empty() {
                continue;
            }
            out = self.replace_spans(&out, &spans);
            let prev = counts.get(&pattern.category).copied().unwrap_or(0);
            counts.insert(pattern.category.clone(), prev + spans.len());
        }

        if self.reduce_whitespace {
            out = reduce_whitespace(&out);
        }

        debug!(
            input_chars = text.chars().count(),
            output_chars = out.chars().count(),
            redactions = counts.total(),
            "phi.anonymized"
        );
        (out, counts)
    }

    /// Rebuild `text` with every span swapped for its redaction token.
    /// Spans must be sorted and non-overlapping, as `find_spans` yields them.
    fn replace_spans(&self, text: &str, spans: &[SpanMatch]) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for span in spans {
            out.push_str(&text[cursor..span.start]);
            out.push_str(&self.strategy.redact(&text[span.start..span.end]));
            cursor = span.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::CustomPattern;

    const SAMPLE: &str = "Patient Mr. John Doe, email a@b.com, phone 415-555-0199. MRN 12345678.";

    fn anonymizer(f: impl FnOnce(&mut AnonymizerConfig)) -> Anonymizer {
        let mut config = AnonymizerConfig::default();
        f(&mut config);
        Anonymizer::new(&config).unwrap()
    }

    #[test]
    fn test_counts_and_non_leakage() {
        let (out, counts) = anonymizer(|_| {}).anonymize(SAMPLE);
        assert_eq!(counts.get("email"), Some(&1));
        assert_eq!(counts.get("phone"), Some(&1));
        assert_eq!(counts.get("mrn"), Some(&1));
        assert!(!out.contains("a@b.com"));
        assert!(!out.contains("415-555-0199"));
        assert!(!out.contains("12345678"));
        assert!(out.contains("<ID:"));
    }

    #[test]
    fn test_original_fixture_with_country_code() {
        let raw = "Patient Mr. John Doe email john.doe@hospital.org, phone +1 415-555-0199. MRN 12345678.";
        let (out, counts) = anonymizer(|_| {}).anonymize(raw);
        assert!(!out.contains("john.doe@hospital.org"));
        assert!(!out.contains("+1 415-555-0199"));
        assert_eq!(counts.get("email"), Some(&1));
        assert_eq!(counts.get("phone"), Some(&1));
        assert_eq!(counts.get("mrn"), Some(&1));
    }

    #[test]
    fn test_deterministic() {
        let a = anonymizer(|_| {});
        assert_eq!(a.anonymize(SAMPLE), a.anonymize(SAMPLE));
    }

    #[test]
    fn test_whitespace_reduction() {
        let (out, counts) = anonymizer(|_| {}).anonymize("Line 1   \n\n   Line 2");
        assert!(!out.contains("   "));
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["Line 1", "Line 2"]);
        assert!(counts.is_empty());
    }

    #[test]
    fn test_empty_and_clean_input() {
        let a = anonymizer(|_| {});
        let (out, counts) = a.anonymize("");
        assert_eq!(out, "");
        assert!(counts.is_empty());

        let (out, counts) = a.anonymize("  No acute   findings. ");
        assert_eq!(out, "No acute findings.");
        assert!(counts.is_empty());
    }

    #[test]
    fn test_whitespace_kept_when_disabled() {
        let a = anonymizer(|c| c.reduce_whitespace = false);
        let (out, _) = a.anonymize("Line 1   \n\n   Line 2");
        assert_eq!(out, "Line 1   \n\n   Line 2");
    }

    #[test]
    fn test_keep_dates_bypasses_matching_and_counting() {
        let text = "Seen on 03/14/2023 for follow-up.";
        let (out, counts) = anonymizer(|_| {}).anonymize(text);
        assert_eq!(counts.get("date"), Some(&1));
        assert!(!out.contains("03/14/2023"));

        let (out, counts) = anonymizer(|c| c.keep_dates = true).anonymize(text);
        assert!(counts.get("date").is_none());
        assert!(out.contains("03/14/2023"));
    }

    #[test]
    fn test_mask_strategy_width_floor() {
        let a = anonymizer(|c| c.strategy = RedactionKind::Mask);
        assert!(matches!(a.strategy(), RedactionStrategy::Mask { mask_char: '█' }));
        let (out, counts) = a.anonymize("contact a@b.com today");
        assert_eq!(counts.get("email"), Some(&1));
        assert_eq!(out, "contact ███████ today");

        assert_eq!(mask_token('#', "ab"), "######");
        assert_eq!(mask_token('#', "abcdefgh"), "########");
    }

    #[test]
    fn test_hash_token_shape_and_stability() {
        let t1 = hash_token("mediscan", "John Doe");
        let t2 = hash_token("mediscan", "John Doe");
        let t3 = hash_token("other-salt", "John Doe");
        assert_eq!(t1, t2);
        assert_ne!(t1, t3);
        assert!(t1.starts_with("<ID:") && t1.ends_with('>'));
        assert_eq!(t1.len(), 4 + HASH_TOKEN_HEX_LEN + 1);
        assert!(t1[4..4 + HASH_TOKEN_HEX_LEN].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_repeated_phi_maps_to_same_token() {
        let (out, counts) = anonymizer(|_| {}).anonymize("a@b.com wrote to a@b.com");
        assert_eq!(counts.get("email"), Some(&2));
        let token = hash_token("mediscan", "a@b.com");
        assert_eq!(out, format!("{} wrote to {}", token, token));
    }

    #[test]
    fn test_counts_follow_table_order() {
        let (_, counts) = anonymizer(|_| {}).anonymize("Dr. Alice Smith called 415-555-0199 about jane@x.org");
        let keys: Vec<&str> = counts.keys().collect();
        assert_eq!(keys, vec!["email", "phone", "name_hint"]);
    }

    #[test]
    fn test_extra_pattern_redacts() {
        let a = anonymizer(|c| {
            c.extra_patterns.push(CustomPattern {
                category: "insurance_id".to_string(),
                pattern: r"\bINS-[A-Z]{4}\b".to_string(),
            })
        });
        let (out, counts) = a.anonymize("policy INS-ABCD on file");
        assert_eq!(counts.get("insurance_id"), Some(&1));
        assert!(!out.contains("INS-ABCD"));
    }

    #[test]
    fn test_unicode_input_keeps_char_boundaries() {
        let a = anonymizer(|c| c.strategy = RedactionKind::Mask);
        let (out, counts) = a.anonymize("Café résumé: écho a@b.com ✓");
        assert_eq!(counts.get("email"), Some(&1));
        assert!(out.starts_with("Café résumé: écho "));
        assert!(out.ends_with(" ✓"));
    }
}
