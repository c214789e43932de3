// Risk Tagger
// Heuristic prior, optional entailment scoring, fusion and threshold decision

use std::sync::Arc;
use tracing::{info, warn};

use super::decision::{decide_label, RiskThresholds};
use super::fusion::{fuse, normalize};
use super::heuristics::heuristic_prior;
use crate::models::{Meta, RiskDecision, RiskDistribution, LOW_RISK};
use crate::services::config_store::RiskConfig;
use crate::services::nlp::{EntailmentClassifier, ModelError, ModelHandle, ENTAILMENT_INDEX};

pub const HEURISTICS_ONLY: &str = "heuristics-only";

/// Hypothesis posed to the classifier for one label.
pub fn hypothesis_for(label: &str) -> String {
    format!("The clinical case is {}.", label)
}

fn head_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct RiskTagger {
    classifier: ModelHandle<Arc<dyn EntailmentClassifier>>,
    labels: Vec<String>,
    thresholds: RiskThresholds,
    heuristics_enabled: bool,
    premise_max_chars: usize,
}

impl RiskTagger {
    pub fn new(config: &RiskConfig, classifier: ModelHandle<Arc<dyn EntailmentClassifier>>) -> Self {
        if let Some(reason) = classifier.reason() {
            warn!("[risk] classifier unavailable, heuristics only: {}", reason);
        }
        Self {
            classifier,
            labels: config.labels(),
            thresholds: RiskThresholds::from(config),
            heuristics_enabled: config.heuristics_enabled,
            premise_max_chars: config.premise_max_chars,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn uses_model(&self) -> bool {
        self.classifier.is_available()
    }

    pub async fn tag(&self, text: &str) -> RiskDecision {
        let prior = self.heuristics_enabled.then(|| heuristic_prior(text));

        let mut fallback: Option<&str> = None;
        let mut model_dist: Option<RiskDistribution> = None;
        match &self.classifier {
            ModelHandle::Available { handle, .. } => match self.model_distribution(handle.as_ref(), text).await {
                Ok(dist) => model_dist = Some(dist),
                Err(ModelError::InvalidResponse(e)) => {
                    warn!("[risk] degenerate classifier output, using heuristics for this call: {}", e);
                    fallback = Some("invalid_scores");
                }
                Err(e) => {
                    warn!("[risk] classifier call failed, using heuristics for this call: {}", e);
                    fallback = Some("inference_error");
                }
            },
            ModelHandle::Unavailable { .. } => fallback = Some("model_unavailable"),
        }

        let (distribution, paths) = match (model_dist, prior) {
            (Some(model), Some(prior)) => (fuse(&model, &prior), "model+heuristics"),
            (Some(model), None) => (model, "model"),
            (None, Some(prior)) => (prior, "heuristics"),
            (None, None) => (std::iter::once((LOW_RISK, 1.0)).collect(), "default"),
        };
        let label = decide_label(&distribution, &self.thresholds);

        let mut meta = Meta::new();
        let model_used = paths.starts_with("model");
        let model_name = match (&self.classifier, model_used) {
            (ModelHandle::Available { name, .. }, true) => name.clone(),
            _ => HEURISTICS_ONLY.to_string(),
        };
        meta.insert("model", model_name);
        meta.insert("heuristics", self.heuristics_enabled.to_string());
        meta.insert("labels", self.labels.join(","));
        meta.insert("paths", paths.to_string());
        if let Some(reason) = fallback {
            meta.insert("fallback", reason.to_string());
        }

        info!(label = %label, paths, "risk.tagged");
        RiskDecision {
            label,
            distribution,
            evidence_meta: meta,
        }
    }

    /// Entailment probability per configured label, L1-normalized.
    async fn model_distribution(
        &self,
        classifier: &dyn EntailmentClassifier,
        text: &str,
    ) -> Result<RiskDistribution, ModelError> {
        let premise = head_chars(text, self.premise_max_chars);
        let mut raw = RiskDistribution::new();
        for label in &self.labels {
            let probs = classifier.score(premise, &hypothesis_for(label)).await?;
            raw.insert(label.clone(), probs[ENTAILMENT_INDEX]);
        }
        normalize(&raw).ok_or_else(|| ModelError::InvalidResponse("entailment scores sum to zero".to_string()))
    }
}
