// Model Collaborators
// Trait seams for the external summarizer, tokenizer, entailment classifier and
// sentence detector, plus the load-once availability handle

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::config_store::SummarizerConfig;

/// Position of the entailment probability in a `[contradiction, neutral, entailment]` vector.
pub const ENTAILMENT_INDEX: usize = 2;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

/// Decoding parameters forwarded to the text generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub num_beams: u32,
    pub do_sample: bool,
    pub temperature: f64,
    pub length_penalty: f64,
    pub early_stopping: bool,
    pub no_repeat_ngram_size: u32,
    pub seed: u64,
}

impl GenerationParams {
    pub fn from_config(config: &SummarizerConfig, seed: u64) -> Self {
        Self {
            max_new_tokens: config.max_output_tokens,
            num_beams: config.num_beams,
            do_sample: config.temperature > 0.0,
            temperature: config.temperature.max(1e-6),
            length_penalty: 1.0,
            early_stopping: true,
            no_repeat_ngram_size: 3,
            seed,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError>;
}

#[async_trait]
pub trait Tokenizer: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError>;

    async fn decode(&self, ids: &[u32]) -> Result<String, ModelError>;

    async fn token_count(&self, text: &str) -> Result<usize, ModelError> {
        Ok(self.encode(text).await?.len())
    }
}

#[async_trait]
pub trait EntailmentClassifier: Send + Sync {
    /// `[contradiction, neutral, entailment]` probabilities.
    async fn score(&self, premise: &str, hypothesis: &str) -> Result<[f64; 3], ModelError>;
}

#[async_trait]
pub trait SentenceDetector: Send + Sync {
    async fn split(&self, text: &str, language: &str) -> Result<Vec<String>, ModelError>;
}

/// A generator that also owns its tokenizer.
pub trait Seq2SeqModel: TextGenerator + Tokenizer {}

impl<T: TextGenerator + Tokenizer> Seq2SeqModel for T {}

/// Load-once model state. Decided at construction and never changed.
#[derive(Debug, Clone)]
pub enum ModelHandle<T> {
    Available { name: String, handle: T },
    Unavailable { reason: String },
}

impl<T> ModelHandle<T> {
    pub fn available(name: impl Into<String>, handle: T) -> Self {
        Self::Available {
            name: name.into(),
            handle,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Await `loader` once; any error becomes a permanent `Unavailable`.
    pub async fn load<F>(kind: &str, name: &str, loader: F) -> Self
    where
        F: Future<Output = Result<T, ModelError>>,
    {
        match loader.await {
            Ok(handle) => {
                info!("[models] loaded {}: {}", kind, name);
                Self::available(name, handle)
            }
            Err(e) => {
                warn!("[models] {} '{}' unavailable, falling back: {}", kind, name, e);
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Available { handle, .. } => Some(handle),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Available { name, .. } => Some(name),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available { .. } => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_params_from_config() {
        let mut config = SummarizerConfig::default();
        let params = GenerationParams::from_config(&config, 42);
        assert!(!params.do_sample);
        assert_eq!(params.temperature, 1e-6);
        assert_eq!(params.num_beams, config.num_beams);
        assert_eq!(params.no_repeat_ngram_size, 3);

        config.temperature = 0.7;
        let params = GenerationParams::from_config(&config, 42);
        assert!(params.do_sample);
        assert_eq!(params.temperature, 0.7);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["maxNewTokens"], 128);
        assert_eq!(json["earlyStopping"], true);
    }

    #[tokio::test]
    async fn test_load_success_and_failure() {
        let ok: ModelHandle<u8> = ModelHandle::load("summarizer", "m", async { Ok(7) }).await;
        assert!(ok.is_available());
        assert_eq!(ok.get(), Some(&7));
        assert_eq!(ok.name(), Some("m"));

        let failed: ModelHandle<u8> =
            ModelHandle::load("summarizer", "m", async { Err(ModelError::Unavailable("no weights".into())) }).await;
        assert!(!failed.is_available());
        assert!(failed.get().is_none());
        assert_eq!(failed.reason(), Some("Model unavailable: no weights"));
    }
}
