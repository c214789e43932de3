// Risk Fusion
// L1 normalization and the weighted blend of model and heuristic distributions

use crate::models::RiskDistribution;

pub const MODEL_WEIGHT: f64 = 0.7;
pub const HEURISTIC_WEIGHT: f64 = 0.3;

/// Scale scores to sum to 1. `None` when the scores are degenerate
/// (non-finite, negative, or all zero).
pub fn normalize(scores: &RiskDistribution) -> Option<RiskDistribution> {
    if scores.values().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let sum = scores.sum();
    if sum <= 0.0 || !sum.is_finite() {
        return None;
    }
    Some(scores.iter().map(|(k, v)| (k, v / sum)).collect())
}

/// `0.7 * model + 0.3 * heuristic` over the union of labels, model labels first.
/// A label missing from one side contributes 0 from that side.
pub fn fuse(model: &RiskDistribution, heuristic: &RiskDistribution) -> RiskDistribution {
    let mut labels: Vec<&str> = model.keys().collect();
    for label in heuristic.keys() {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
        .into_iter()
        .map(|label| {
            let p = MODEL_WEIGHT * model.prob(label) + HEURISTIC_WEIGHT * heuristic.prob(label);
            (label, p)
        })
        .collect()
}
