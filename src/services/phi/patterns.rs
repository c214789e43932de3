// PHI Detection Patterns
// Built-in categorized table plus configuration-supplied extras

use std::sync::OnceLock;

use super::anonymizer::AnonymizerError;
use crate::services::config_store::CustomPattern;
use crate::services::span_matcher::{Applicability, DetectionPattern};

/// (category, pattern, applicability) in scan order.
///
/// mrn precedes phone: a bare 8-digit record number also has the phone shape.
const BUILTIN_PATTERNS: &[(&str, &str, Applicability)] = &[
    (
        "email",
        r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b",
        Applicability::Always,
    ),
    (
        "mrn",
        r"(?i)\b(MRN[:\s]*\d{5,12}|\d{7,12})\b",
        Applicability::Always,
    ),
    (
        "phone",
        r"\b(?:\+?\d{1,3})?[-. (]*\d{2,4}[-. )]*\d{3,4}[-. ]*\d{3,4}\b",
        Applicability::Always,
    ),
    ("ssn_like", r"\b\d{3}-\d{2}-\d{4}\b", Applicability::Always),
    (
        "date",
        r"(?i)\b(?:\d{1,2}[-/]\d{1,2}[-/]\d{2,4}|(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{1,2},\s+\d{4})\b",
        Applicability::UnlessKeepDates,
    ),
    (
        "name_hint",
        r"\b(?:Patient|Pt\.?|Mr\.|Ms\.|Mrs\.|Dr\.|MD|RN)\s+[A-Z][a-z]+(?:\s[A-Z][a-z]+)?\b",
        Applicability::Always,
    ),
    (
        "address_like",
        r"(?i)\b\d{1,5}\s+[A-Z][A-Za-z]+\s(?:St|Street|Ave|Avenue|Rd|Road|Blvd|Boulevard|Ln|Lane)\b",
        Applicability::Always,
    ),
];

static BUILTIN: OnceLock<Vec<DetectionPattern>> = OnceLock::new();

/// The built-in PHI table, compiled once per process.
pub fn builtin_patterns() -> &'static [DetectionPattern] {
    BUILTIN.get_or_init(|| {
        BUILTIN_PATTERNS
            .iter()
            .map(|(category, pattern, applicability)| {
                DetectionPattern::new(category, pattern, *applicability)
                    .expect("built-in PHI pattern failed to compile")
            })
            .collect()
    })
}

pub fn builtin_categories() -> Vec<&'static str> {
    BUILTIN_PATTERNS.iter().map(|(c, _, _)| *c).collect()
}

/// Built-in table followed by configured extras, in that order.
pub fn phi_table(extra: &[CustomPattern]) -> Result<Vec<DetectionPattern>, AnonymizerError> {
    let mut table = builtin_patterns().to_vec();
    for custom in extra {
        let category = custom.category.trim();
        if category.is_empty() {
            return Err(AnonymizerError::EmptyCategory {
                pattern: custom.pattern.clone(),
            });
        }
        let pattern = DetectionPattern::new(category, &custom.pattern, Applicability::Always)
            .map_err(|source| AnonymizerError::InvalidPattern {
                category: category.to_string(),
                source,
            })?;
        table.push(pattern);
    }
    Ok(table)
}
