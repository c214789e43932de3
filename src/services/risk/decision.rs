// Risk Decision
// Threshold overrides escalate the argmax label, never suppress it

use crate::models::{RiskDistribution, HIGH_RISK, LOW_RISK, MODERATE_RISK};
use crate::services::config_store::RiskConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub high: f64,
    pub moderate: f64,
}

impl From<&RiskConfig> for RiskThresholds {
    fn from(config: &RiskConfig) -> Self {
        Self {
            high: config.threshold_high,
            moderate: config.threshold_moderate,
        }
    }
}

/// High threshold first, then moderate (unless the argmax is already high),
/// otherwise the argmax. An empty distribution decides "low risk".
pub fn decide_label(distribution: &RiskDistribution, thresholds: &RiskThresholds) -> String {
    let top = distribution.argmax().unwrap_or(LOW_RISK);
    if distribution.prob(HIGH_RISK) >= thresholds.high {
        return HIGH_RISK.to_string();
    }
    if distribution.prob(MODERATE_RISK) >= thresholds.moderate && top != HIGH_RISK {
        return MODERATE_RISK.to_string();
    }
    top.to_string()
}
