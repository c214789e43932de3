// Analysis Orchestrator
// Anonymize -> segment -> (summarize || risk-tag) -> unified result

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{AnalysisResult, Meta, PhiCounts};
use crate::services::config_store::AppConfig;
use crate::services::nlp::Summarizer;
use crate::services::phi::{Anonymizer, AnonymizerError};
use crate::services::providers::ModelSet;
use crate::services::risk::RiskTagger;
use crate::services::sentence_segmenter::Segmenter;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Pattern(#[from] AnonymizerError),
}

/// Flatten per-stage diagnostics into one map: `phi_*`, then `summ_*`, then `risk_*`.
pub fn merge_meta(phi_counts: &PhiCounts, summarization: &Meta, risk: &Meta) -> Meta {
    let mut meta = Meta::new();
    for (k, v) in phi_counts.iter() {
        meta.insert(format!("phi_{}", k), v.to_string());
    }
    for (k, v) in summarization.iter() {
        meta.insert(format!("summ_{}", k), v.clone());
    }
    for (k, v) in risk.iter() {
        meta.insert(format!("risk_{}", k), v.clone());
    }
    meta
}

/// Anonymized text, its PHI counts and its sentences.
pub struct Preprocessed {
    pub anonymized: String,
    pub phi_counts: PhiCounts,
    pub sentences: Vec<String>,
}

pub struct Analyzer {
    anonymizer: Anonymizer,
    segmenter: Segmenter,
    summarizer: Summarizer,
    risk: RiskTagger,
}

impl Analyzer {
    /// Validate the configuration, then load every model collaborator once.
    pub async fn new(config: &AppConfig) -> Result<Self, AnalyzerError> {
        config.validate().map_err(AnalyzerError::Config)?;
        let models = ModelSet::load(config).await;
        Self::with_models(config, models)
    }

    pub fn with_models(config: &AppConfig, models: ModelSet) -> Result<Self, AnalyzerError> {
        config.validate().map_err(AnalyzerError::Config)?;
        Ok(Self {
            anonymizer: Anonymizer::new(&config.anonymizer)?,
            segmenter: Segmenter::new(models.segmenter),
            summarizer: Summarizer::new(&config.summarizer, config.inference.seed, models.summarizer),
            risk: RiskTagger::new(&config.risk, models.classifier),
        })
    }

    pub fn anonymizer(&self) -> &Anonymizer {
        &self.anonymizer
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    pub fn risk(&self) -> &RiskTagger {
        &self.risk
    }

    pub async fn preprocess(&self, text: &str) -> Preprocessed {
        let (anonymized, phi_counts) = self.anonymizer.anonymize(text);
        let sentences = self.segmenter.split_sentences(&anonymized).await;
        Preprocessed {
            anonymized,
            phi_counts,
            sentences,
        }
    }

    pub async fn run(&self, text: &str, report_type: &str) -> AnalysisResult {
        let request_id = Uuid::new_v4().to_string();
        let Preprocessed {
            anonymized,
            phi_counts,
            sentences,
        } = self.preprocess(text).await;

        info!(
            "[ANALYZE] {} anonymized={} chars | sents={} | type={}",
            request_id,
            anonymized.chars().count(),
            sentences.len(),
            report_type
        );

        let ((summary, summarization_meta), risk) = tokio::join!(
            self.summarizer.summarize(&anonymized, report_type),
            self.risk.tag(&anonymized)
        );

        let meta = merge_meta(&phi_counts, &summarization_meta, &risk.evidence_meta);
        info!(
            "[ANALYZE] {} risk={} summary_mode={}",
            request_id,
            risk.label,
            summarization_meta.get("mode").map(String::as_str).unwrap_or("unknown")
        );

        AnalysisResult {
            request_id,
            report_type: report_type.to_string(),
            summary,
            risk_meta: risk.evidence_meta.clone(),
            risk,
            sentences,
            anonymized_text: anonymized,
            phi_counts,
            summarization_meta,
            meta,
        }
    }
}
