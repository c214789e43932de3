// Summarization Service
// Abstractive summaries through the seq2seq collaborator, with a local extractive fallback

use std::sync::Arc;
use tracing::{info, warn};

use super::model::{GenerationParams, ModelError, ModelHandle, Seq2SeqModel};
use super::prompts::{post_summarize, PromptStyle, MAX_SUMMARY_SENTENCES};
use super::truncation::TruncationPlanner;
use crate::models::Meta;
use crate::services::config_store::SummarizerConfig;
use crate::services::text_processor::{collapse_whitespace, split_on_terminal_punct};

/// Cleaned inputs shorter than this are returned as-is.
pub const SHORT_TEXT_CHARS: usize = 20;

const POSITION_DECAY: f64 = 0.15;
const BOOST_SCALE: f64 = 0.15;

/// Keyword weights for the extractive scorer, matched as lowercase substrings.
pub const KEY_BOOSTS: &[(&str, f64)] = &[
    ("pneumonia", 1.6),
    ("hemorrhage", 1.8),
    ("malignant", 1.7),
    ("mass", 1.5),
    ("effusion", 1.4),
    ("cardiomegaly", 1.4),
    ("consolidation", 1.5),
    ("fracture", 1.6),
    ("ischemia", 1.7),
    ("embolism", 1.8),
];

fn keyword_boost(sentence: &str) -> f64 {
    let lower = sentence.to_lowercase();
    KEY_BOOSTS
        .iter()
        .filter(|(k, _)| lower.contains(k))
        .map(|(_, w)| w)
        .sum()
}

/// log(words + 1) * 1/(1 + 0.15 i) * (1 + 0.15 * boost)
pub fn sentence_score(index: usize, sentence: &str) -> f64 {
    let words = sentence.split_whitespace().count() as f64;
    let base = (words + 1.0).ln();
    let position = 1.0 / (1.0 + index as f64 * POSITION_DECAY);
    base * position * (1.0 + keyword_boost(sentence) * BOOST_SCALE)
}

/// Pick the `max_sents` best-scoring sentences, joined in score order.
///
/// When no sentence is longer than three characters, the first `max_sents`
/// pieces are kept in document order instead.
pub fn extractive_summary(text: &str, max_sents: usize) -> String {
    let pieces: Vec<String> = split_on_terminal_punct(text)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let sentences: Vec<&String> = pieces.iter().filter(|s| s.chars().count() > 3).collect();
    if sentences.is_empty() {
        if pieces.is_empty() {
            return text.trim().to_string();
        }
        return pieces.iter().take(max_sents).map(String::as_str).collect::<Vec<_>>().join(" ");
    }

    let mut scored: Vec<(f64, &str)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (sentence_score(i, s), s.as_str()))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(max_sents)
        .map(|(_, s)| s)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Summarizer {
    model: ModelHandle<Arc<dyn Seq2SeqModel>>,
    planner: TruncationPlanner,
    style: PromptStyle,
    params: GenerationParams,
}

impl Summarizer {
    pub fn new(config: &SummarizerConfig, seed: u64, model: ModelHandle<Arc<dyn Seq2SeqModel>>) -> Self {
        if let Some(reason) = model.reason() {
            warn!("[summarizer] abstractive model unavailable, using extractive fallback: {}", reason);
        }
        Self {
            model,
            planner: TruncationPlanner::new(config.max_input_tokens),
            style: PromptStyle::from_id(&config.prompt_style),
            params: GenerationParams::from_config(config, seed),
        }
    }

    pub fn is_abstractive(&self) -> bool {
        self.model.is_available()
    }

    pub fn style(&self) -> PromptStyle {
        self.style
    }

    pub async fn summarize(&self, text: &str, report_type: &str) -> (String, Meta) {
        let clean = collapse_whitespace(text);
        if clean.chars().count() < SHORT_TEXT_CHARS {
            let meta: Meta = vec![("mode", "passthrough"), ("reason", "short_text")]
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect();
            return (clean, meta);
        }

        let fallback_reason = match &self.model {
            ModelHandle::Available { name, handle } => match self.abstractive(handle.as_ref(), &clean).await {
                Ok((summary, truncated)) => {
                    info!(
                        summary_chars = summary.chars().count(),
                        truncated,
                        "summarizer.abstractive"
                    );
                    let mut meta = Meta::new();
                    meta.insert("mode", "abstractive".to_string());
                    meta.insert("model", name.clone());
                    meta.insert("report_type", report_type.to_string());
                    if truncated {
                        meta.insert("truncated", "true".to_string());
                    }
                    return (summary, meta);
                }
                Err(e) => {
                    warn!("[summarizer] generation failed, using extractive fallback: {}", e);
                    Some("inference_error")
                }
            },
            ModelHandle::Unavailable { .. } => None,
        };

        let summary = extractive_summary(&clean, MAX_SUMMARY_SENTENCES);
        let mut meta = Meta::new();
        meta.insert("mode", "extractive".to_string());
        meta.insert("report_type", report_type.to_string());
        meta.insert("model", "fallback".to_string());
        if let Some(reason) = fallback_reason {
            meta.insert("reason", reason.to_string());
        }
        (summary, meta)
    }

    async fn abstractive(&self, model: &dyn Seq2SeqModel, clean: &str) -> Result<(String, bool), ModelError> {
        let prompt = self.style.render(clean);
        let (prompt, plan) = self.planner.plan(model, &prompt).await?;
        let raw = model.generate(&prompt, &self.params).await?;
        let summary = post_summarize(raw.trim());
        if summary.is_empty() {
            return Err(ModelError::InvalidResponse("empty summary".to_string()));
        }
        Ok((summary, plan.was_truncated()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::nlp::testing::FakeSeq2Seq;

    const REPORT: &str = "Chest radiograph obtained. There is a right lower lobe consolidation concerning for pneumonia. \
Heart size normal. No fracture. Small pleural effusion noted.";

    fn summarizer(model: ModelHandle<Arc<dyn Seq2SeqModel>>) -> Summarizer {
        Summarizer::new(&SummarizerConfig::default(), 42, model)
    }

    #[test]
    fn test_extractive_orders_by_score() {
        let out = extractive_summary(REPORT, 3);
        assert_eq!(
            out,
            "There is a right lower lobe consolidation concerning for pneumonia. \
Chest radiograph obtained. Small pleural effusion noted."
        );
    }

    #[test]
    fn test_extractive_without_usable_sentences_keeps_leading_pieces() {
        assert_eq!(extractive_summary("ok. no.", 3), "ok. no.");
        assert_eq!(extractive_summary("ab. cd. ef. gh. ij. kl. mn. op.", 3), "ab. cd. ef.");
        assert_eq!(extractive_summary("abc", 3), "abc");
    }

    #[tokio::test]
    async fn test_unavailable_model_caps_tiny_fragments() {
        let s = summarizer(ModelHandle::unavailable("offline"));
        let (out, meta) = s.summarize("ab. cd. ef. gh. ij. kl. mn. op.", "radiology").await;
        assert_eq!(split_on_terminal_punct(&out).len(), 3);
        assert_eq!(meta.get("mode").map(String::as_str), Some("extractive"));
    }

    #[test]
    fn test_keyword_boost_is_case_insensitive() {
        assert!((keyword_boost("Massive HEMORRHAGE") - 3.3).abs() < 1e-9);
        assert!(sentence_score(0, "acute hemorrhage seen") > sentence_score(0, "nothing acute seen"));
        assert!(sentence_score(0, "same words here") > sentence_score(4, "same words here"));
    }

    #[tokio::test]
    async fn test_short_text_passthrough() {
        let s = summarizer(ModelHandle::unavailable("offline"));
        let (out, meta) = s.summarize("  No   acute  ", "radiology").await;
        assert_eq!(out, "No acute");
        assert_eq!(meta.get("mode").map(String::as_str), Some("passthrough"));
        assert_eq!(meta.get("reason").map(String::as_str), Some("short_text"));
    }

    #[tokio::test]
    async fn test_unavailable_model_uses_extractive() {
        let s = summarizer(ModelHandle::unavailable("offline"));
        assert!(!s.is_abstractive());
        assert_eq!(s.style(), PromptStyle::RadiologyBrief);
        let (out, meta) = s.summarize(REPORT, "radiology").await;
        assert!(!out.is_empty());
        assert!(split_on_terminal_punct(&out).len() <= 3);
        assert_eq!(meta.get("mode").map(String::as_str), Some("extractive"));
        assert_eq!(meta.get("model").map(String::as_str), Some("fallback"));
        assert!(meta.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_abstractive_path_cleans_output() {
        let fake = Arc::new(FakeSeq2Seq::replying("SUMMARY: Right lower lobe pneumonia. Small effusion. Normal heart. Extra."));
        let handle: Arc<dyn Seq2SeqModel> = fake.clone();
        let s = summarizer(ModelHandle::available("flan", handle));
        let (out, meta) = s.summarize(REPORT, "radiology").await;
        assert_eq!(out, "Right lower lobe pneumonia. Small effusion. Normal heart.");
        assert_eq!(meta.get("mode").map(String::as_str), Some("abstractive"));
        assert_eq!(meta.get("model").map(String::as_str), Some("flan"));
        assert_eq!(meta.get("report_type").map(String::as_str), Some("radiology"));

        let prompt = fake.last_prompt().unwrap();
        assert!(prompt.starts_with("You are a senior radiologist."));
        assert!(prompt.contains("consolidation concerning for pneumonia"));
    }

    #[tokio::test]
    async fn test_long_prompt_is_truncated() {
        let fake = Arc::new(FakeSeq2Seq::replying("Findings summarized."));
        let handle: Arc<dyn Seq2SeqModel> = fake.clone();
        let config = SummarizerConfig {
            max_input_tokens: 10,
            ..SummarizerConfig::default()
        };
        let s = Summarizer::new(&config, 42, ModelHandle::available("flan", handle));
        let (_, meta) = s.summarize(REPORT, "radiology").await;
        assert_eq!(meta.get("truncated").map(String::as_str), Some("true"));
        let prompt = fake.last_prompt().unwrap();
        assert_eq!(prompt.split_whitespace().count(), 10);
        assert!(prompt.ends_with("SUMMARY:"));
    }

    #[tokio::test]
    async fn test_generation_error_falls_back_for_that_call() {
        let handle: Arc<dyn Seq2SeqModel> = Arc::new(FakeSeq2Seq::failing());
        let s = summarizer(ModelHandle::available("flan", handle));
        let (out, meta) = s.summarize(REPORT, "radiology").await;
        assert!(!out.is_empty());
        assert_eq!(meta.get("mode").map(String::as_str), Some("extractive"));
        assert_eq!(meta.get("reason").map(String::as_str), Some("inference_error"));
        assert!(s.is_abstractive());
    }
}
