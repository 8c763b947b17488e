//! Hosted embedding provider for OpenAI-compatible `/embeddings` endpoints
use super::{Embedding, EmbeddingError, EmbeddingProvider, DEFAULT_DIMENSION, DEFAULT_MODEL};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// OpenAI embedding provider
pub struct OpenAIProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    model: String,
    dimension: usize,
}

impl OpenAIProvider {
    /// Create a provider for text-embedding-3-small against api.openai.com
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Set the base URL (no trailing `/embeddings`)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model and the dimension it produces
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    /// Bound every request by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, EmbeddingError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        debug!(
            "Requesting {} embeddings with model: {}",
            input.len(),
            self.model
        );

        let body = serde_json::json!({
            "input": input,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("{}: {}", status, error_text)));
        }

        let result: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let mut data = result.data;
        if data.len() != input.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                input.len(),
                data.len()
            )));
        }

        // The API does not promise response order; `index` points back into `input`
        data.sort_by_key(|item| item.index);
        if data.iter().enumerate().any(|(i, item)| item.index != i) {
            return Err(EmbeddingError::InvalidResponse(
                "response indices do not cover the request".to_string(),
            ));
        }

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: item.embedding.len(),
                });
            }
            embeddings.push(item.embedding);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.request(texts).await?;
        info!("Generated {} batch embeddings", embeddings.len());
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new("test-key")
            .with_base_url(server.uri())
            .with_model("text-embedding-3-small", 2)
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [0.0, 1.0], "index": 1},
                    {"embedding": [1.0, 0.0], "index": 0}
                ],
                "model": "text-embedding-3-small"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let texts = vec!["first".to_string(), "second".to_string()];
        let embeddings = provider(&server).embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let result = provider(&server).embed("password safety").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::RateLimited {
                retry_after_secs: 7
            })
        ));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 0.0], "index": 0}]
            })))
            .mount(&server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let result = provider(&server).embed_batch(&texts).await;
        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 0.0, 0.0], "index": 0}]
            })))
            .mount(&server)
            .await;

        let result = provider(&server).embed("query").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = provider(&server).embed("query").await;
        assert!(matches!(result, Err(EmbeddingError::Api(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let embeddings = provider(&server).embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
