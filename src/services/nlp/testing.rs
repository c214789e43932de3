// In-process fake collaborators for unit tests

use async_trait::async_trait;
use std::sync::Mutex;

use super::model::{
    EntailmentClassifier, GenerationParams, ModelError, SentenceDetector, TextGenerator, Tokenizer,
};

/// Whitespace tokenizer with a growing vocabulary, so decode(encode(x)) rejoins words.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: Mutex<Vec<String>>,
}

#[async_trait]
impl Tokenizer for WordTokenizer {
    async fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError> {
        let mut vocab = self.vocab.lock().map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let mut ids = Vec::new();
        for word in text.split_whitespace() {
            let id = match vocab.iter().position(|w| w == word) {
                Some(i) => i,
                None => {
                    vocab.push(word.to_string());
                    vocab.len() - 1
                }
            };
            ids.push(id as u32);
        }
        Ok(ids)
    }

    async fn decode(&self, ids: &[u32]) -> Result<String, ModelError> {
        let vocab = self.vocab.lock().map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let words: Vec<&str> = ids
            .iter()
            .filter_map(|id| vocab.get(*id as usize).map(|w| w.as_str()))
            .collect();
        Ok(words.join(" "))
    }
}

/// Seq2seq fake replying with a canned text (or error) and recording prompts.
pub struct FakeSeq2Seq {
    reply: Option<String>,
    tokenizer: WordTokenizer,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeSeq2Seq {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            tokenizer: WordTokenizer::default(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            tokenizer: WordTokenizer::default(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait]
impl TextGenerator for FakeSeq2Seq {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ModelError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply
            .clone()
            .ok_or_else(|| ModelError::Unavailable("generation failed".to_string()))
    }
}

#[async_trait]
impl Tokenizer for FakeSeq2Seq {
    async fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError> {
        self.tokenizer.encode(text).await
    }

    async fn decode(&self, ids: &[u32]) -> Result<String, ModelError> {
        self.tokenizer.decode(ids).await
    }
}

/// Classifier returning a fixed entailment probability per label found in the hypothesis.
pub struct FakeClassifier {
    entailment: Vec<(String, f64)>,
    fail: bool,
}

impl FakeClassifier {
    pub fn new(entailment: &[(&str, f64)]) -> Self {
        Self {
            entailment: entailment.iter().map(|(l, p)| (l.to_string(), *p)).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            entailment: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl EntailmentClassifier for FakeClassifier {
    async fn score(&self, _premise: &str, hypothesis: &str) -> Result<[f64; 3], ModelError> {
        if self.fail {
            return Err(ModelError::Api {
                status: 503,
                message: "classifier offline".to_string(),
            });
        }
        // Longest label first so "high risk" isn't shadowed by a shorter overlapping label
        let mut candidates: Vec<&(String, f64)> = self.entailment.iter().collect();
        candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let p = candidates
            .into_iter()
            .find(|(label, _)| hypothesis.contains(&format!("is {}.", label)))
            .map(|(_, p)| *p)
            .unwrap_or(0.0);
        Ok([1.0 - p, 0.0, p])
    }
}

/// Detector splitting on newlines, or failing on demand.
pub struct FakeDetector {
    fail: bool,
}

impl FakeDetector {
    pub fn lines() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl SentenceDetector for FakeDetector {
    async fn split(&self, text: &str, _language: &str) -> Result<Vec<String>, ModelError> {
        if self.fail {
            return Err(ModelError::Unavailable("detector offline".to_string()));
        }
        Ok(text.lines().map(|l| l.to_string()).collect())
    }
}
