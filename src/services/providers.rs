// Inference Provider Service
// JSON client for the local model sidecar (generation, tokenization, NLI, segmentation)

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::services::config_store::AppConfig;
use crate::services::nlp::{
    EntailmentClassifier, GenerationParams, ModelError, ModelHandle, SentenceDetector, Seq2SeqModel, TextGenerator,
    Tokenizer,
};

#[derive(Debug, Clone, Deserialize)]
pub struct SidecarHealth {
    pub status: String,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    ids: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct DetokenizeRequest<'a> {
    model: &'a str,
    ids: &'a [u32],
}

#[derive(Debug, Serialize)]
struct NliRequest<'a> {
    model: &'a str,
    premise: &'a str,
    hypothesis: &'a str,
}

#[derive(Debug, Deserialize)]
struct NliResponse {
    probs: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct SegmentedSentence {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    sentences: Vec<SegmentedSentence>,
}

/// Client bound to one sidecar model. An empty model name targets model-less
/// endpoints such as `/segment`.
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
    model: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn health(&self) -> Result<SidecarHealth, ModelError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))
    }

    /// Succeeds only when the sidecar is healthy and serves this client's model.
    pub async fn ensure_model(self) -> Result<Self, ModelError> {
        let health = self.health().await?;
        if health.status != "ok" {
            return Err(ModelError::Unavailable(format!("sidecar status '{}'", health.status)));
        }
        if !self.model.is_empty() && !health.models.iter().any(|m| m == &self.model) {
            return Err(ModelError::Unavailable(format!(
                "model '{}' is not served by {}",
                self.model, self.base_url
            )));
        }
        Ok(self)
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ModelError> {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let response = self.client.post(&url).json(body).send().await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();
        debug!(path, status = status.as_u16(), latency_ms, "inference.call");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for InferenceClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            params,
        };
        let response: TextResponse = self.post_json("/generate", &request).await?;
        Ok(response.text)
    }
}

#[async_trait]
impl Tokenizer for InferenceClient {
    async fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError> {
        let request = TokenizeRequest {
            model: &self.model,
            text,
        };
        let response: TokenizeResponse = self.post_json("/tokenize", &request).await?;
        Ok(response.ids)
    }

    async fn decode(&self, ids: &[u32]) -> Result<String, ModelError> {
        let request = DetokenizeRequest {
            model: &self.model,
            ids,
        };
        let response: TextResponse = self.post_json("/detokenize", &request).await?;
        Ok(response.text)
    }
}

#[async_trait]
impl EntailmentClassifier for InferenceClient {
    async fn score(&self, premise: &str, hypothesis: &str) -> Result<[f64; 3], ModelError> {
        let request = NliRequest {
            model: &self.model,
            premise,
            hypothesis,
        };
        let response: NliResponse = self.post_json("/nli", &request).await?;
        match response.probs.as_slice() {
            [c, n, e] => Ok([*c, *n, *e]),
            other => Err(ModelError::InvalidResponse(format!(
                "expected 3 NLI probabilities, got {}",
                other.len()
            ))),
        }
    }
}

#[async_trait]
impl SentenceDetector for InferenceClient {
    async fn split(&self, text: &str, language: &str) -> Result<Vec<String>, ModelError> {
        let request = SegmentRequest { text, language };
        let response: SegmentResponse = self.post_json("/segment", &request).await?;
        Ok(response.sentences.into_iter().map(|s| s.text).collect())
    }
}

/// Process-wide model handles, loaded once and shared read-only.
pub struct ModelSet {
    pub summarizer: ModelHandle<Arc<dyn Seq2SeqModel>>,
    pub classifier: ModelHandle<Arc<dyn EntailmentClassifier>>,
    pub segmenter: ModelHandle<Arc<dyn SentenceDetector>>,
}

impl ModelSet {
    pub fn unavailable(reason: &str) -> Self {
        Self {
            summarizer: ModelHandle::unavailable(reason),
            classifier: ModelHandle::unavailable(reason),
            segmenter: ModelHandle::unavailable(reason),
        }
    }

    /// Probe the sidecar for every collaborator in parallel. Failures become
    /// permanent `Unavailable` handles; nothing is retried later.
    pub async fn load(config: &AppConfig) -> Self {
        let inference = &config.inference;
        if !inference.enabled {
            return Self::unavailable("inference disabled by configuration");
        }
        let timeout = Duration::from_secs(inference.timeout_secs.max(1));

        let connect = |url: &str, model: &str| {
            let client = InferenceClient::new(url, model, timeout);
            async move {
                match client {
                    Ok(c) => c.ensure_model().await,
                    Err(e) => Err(e),
                }
            }
        };

        let summarizer_model = config.summarizer.model.as_str();
        let nli_model = config.risk.nli_model.as_str();
        let segmenter_url = inference.segmenter_base_url();

        let (summarizer, classifier, segmenter) = tokio::join!(
            ModelHandle::load("summarizer", summarizer_model, async {
                connect(&inference.base_url, summarizer_model)
                    .await
                    .map(|c| Arc::new(c) as Arc<dyn Seq2SeqModel>)
            }),
            ModelHandle::load("classifier", nli_model, async {
                connect(&inference.base_url, nli_model)
                    .await
                    .map(|c| Arc::new(c) as Arc<dyn EntailmentClassifier>)
            }),
            ModelHandle::load("segmenter", segmenter_url, async {
                connect(segmenter_url, "")
                    .await
                    .map(|c| Arc::new(c) as Arc<dyn SentenceDetector>)
            }),
        );

        Self {
            summarizer,
            classifier,
            segmenter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = InferenceClient::new("http://127.0.0.1:8790/", "flan", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8790");
        assert_eq!(client.model(), "flan");
    }

    #[test]
    fn test_generate_request_shape() {
        let params = GenerationParams::from_config(&Default::default(), 7);
        let request = GenerateRequest {
            model: "flan",
            prompt: "p",
            params: &params,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "flan");
        assert_eq!(json["numBeams"], 4);
        assert_eq!(json["noRepeatNgramSize"], 3);
        assert_eq!(json["seed"], 7);
    }

    #[tokio::test]
    async fn test_disabled_inference_is_unavailable() {
        let mut config = AppConfig::default();
        config.inference.enabled = false;
        let models = ModelSet::load(&config).await;
        assert!(!models.summarizer.is_available());
        assert!(!models.classifier.is_available());
        assert!(!models.segmenter.is_available());
        assert_eq!(models.summarizer.reason(), Some("inference disabled by configuration"));
    }

    #[tokio::test]
    async fn test_unreachable_sidecar_is_unavailable() {
        let mut config = AppConfig::default();
        config.inference.base_url = "http://127.0.0.1:1".to_string();
        config.inference.timeout_secs = 2;
        let models = ModelSet::load(&config).await;
        assert!(!models.summarizer.is_available());
        assert!(!models.classifier.is_available());
        assert!(!models.segmenter.is_available());
    }
}
