// Sentence Segmenter
// Trained boundary detector when loaded, rule-based splitting otherwise

use std::sync::Arc;
use tracing::{debug, warn};

use crate::services::nlp::{ModelHandle, SentenceDetector};
use crate::services::text_processor::{detect_language, split_sentences_rule_based};

const DEFAULT_LANGUAGE: &str = "en";

fn keep_fragment(s: &str) -> Option<String> {
    let t = s.trim();
    (t.chars().count() > 1).then(|| t.to_string())
}

pub struct Segmenter {
    detector: ModelHandle<Arc<dyn SentenceDetector>>,
}

impl Segmenter {
    pub fn new(detector: ModelHandle<Arc<dyn SentenceDetector>>) -> Self {
        Self { detector }
    }

    /// Segmenter that only ever uses the rule-based splitter.
    pub fn rule_based() -> Self {
        Self::new(ModelHandle::unavailable("rule-based segmentation"))
    }

    pub fn uses_detector(&self) -> bool {
        self.detector.is_available()
    }

    /// Ordered sentences with one-character fragments dropped.
    /// Whitespace-only input yields nothing.
    pub async fn split_sentences(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        if let ModelHandle::Available { handle, .. } = &self.detector {
            let language = detect_language(text).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
            match handle.split(text, &language).await {
                Ok(sentences) => {
                    let kept: Vec<String> = sentences.iter().filter_map(|s| keep_fragment(s)).collect();
                    debug!(count = kept.len(), language = %language, "segmenter.detector");
                    return kept;
                }
                Err(e) => {
                    warn!("[segmenter] boundary detector failed, using rule-based split: {}", e);
                }
            }
        }

        split_sentences_rule_based(text)
    }
}
