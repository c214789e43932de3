// Risk Heuristics
// Severity keyword table and the coarse prior it induces over risk labels

use std::sync::OnceLock;

use crate::models::{RiskDistribution, HIGH_RISK, LOW_RISK, MODERATE_RISK};
use crate::services::span_matcher::{Applicability, DetectionPattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Moderate,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

const HIGH_PATTERNS: &[&str] = &[
    r"\b(subarachnoid|intracranial)\s+hemorrhage\b",
    r"\bmass\s+(?:with|and)?\s*invasion\b",
    r"\bpulmonary\s+embolism\b",
    r"\bstemi\b|\bnstemi\b|\bmyocardial\s+infarction\b",
    r"\bmalignan\w+\b",
    r"\bperforation\b",
];

const MODERATE_PATTERNS: &[&str] = &[
    r"\bcardiomegaly\b",
    r"\bconsolidation\b",
    r"\beffusion\b",
    r"\bpneumonia\b",
    r"\bfracture\b",
    r"\bischemi\w+\b",
];

static SEVERITY_TABLE: OnceLock<Vec<DetectionPattern>> = OnceLock::new();

/// Case-insensitive severity patterns, high group first. Tags are "high" / "moderate".
pub fn severity_patterns() -> &'static [DetectionPattern] {
    SEVERITY_TABLE.get_or_init(|| {
        let groups = [(Severity::High, HIGH_PATTERNS), (Severity::Moderate, MODERATE_PATTERNS)];
        groups
            .iter()
            .flat_map(|(severity, patterns)| {
                patterns.iter().map(move |p| {
                    DetectionPattern::new(severity.as_str(), &format!("(?i){}", p), Applicability::Always)
                        .expect("built-in severity pattern failed to compile")
                })
            })
            .collect()
    })
}

/// Highest severity with at least one match, if any.
pub fn severity_tier(text: &str) -> Option<Severity> {
    severity_patterns()
        .iter()
        .filter(|p| p.regex.is_match(text))
        .filter_map(|p| Severity::parse(&p.category))
        .max()
}

/// Fixed prior per tier, keyed in canonical label order.
pub fn prior_for(tier: Option<Severity>) -> RiskDistribution {
    let (low, moderate, high) = match tier {
        Some(Severity::High) => (0.05, 0.10, 0.85),
        Some(Severity::Moderate) => (0.20, 0.60, 0.20),
        None => (0.70, 0.25, 0.05),
    };
    vec![(LOW_RISK, low), (MODERATE_RISK, moderate), (HIGH_RISK, high)]
        .into_iter()
        .collect()
}

pub fn heuristic_prior(text: &str) -> RiskDistribution {
    prior_for(severity_tier(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(severity_tier("Acute SUBARACHNOID hemorrhage."), Some(Severity::High));
        assert_eq!(severity_tier("Findings suggest malignancy."), Some(Severity::High));
        assert_eq!(severity_tier("Mass with invasion of the wall"), Some(Severity::High));
        assert_eq!(severity_tier("Right pleural effusion and fracture."), Some(Severity::Moderate));
        assert_eq!(severity_tier("Ischemic changes noted"), Some(Severity::Moderate));
        assert_eq!(severity_tier("No acute findings."), None);
        assert_eq!(severity_tier(""), None);
    }

    #[test]
    fn test_high_wins_over_moderate() {
        assert_eq!(severity_tier("Effusion with pulmonary embolism."), Some(Severity::High));
    }

    #[test]
    fn test_prior_values() {
        let prior = heuristic_prior("acute subarachnoid hemorrhage");
        assert_eq!(prior.prob(HIGH_RISK), 0.85);
        assert_eq!(prior.prob(MODERATE_RISK), 0.10);
        assert_eq!(prior.prob(LOW_RISK), 0.05);

        let none = heuristic_prior("unremarkable");
        assert_eq!(none.prob(LOW_RISK), 0.70);
        for tier in [None, Some(Severity::Moderate), Some(Severity::High)] {
            assert!((prior_for(tier).sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pattern_tags() {
        let table = severity_patterns();
        assert_eq!(table.len(), 12);
        assert!(table[..6].iter().all(|p| p.category == "high"));
        assert!(table[6..].iter().all(|p| p.category == "moderate"));
    }
}
