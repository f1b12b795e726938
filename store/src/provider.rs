//! Embedding providers.
//!
//! The engine only requires [`EmbeddingProvider`]; which backend fills
//! it is a deployment decision. Providers must be deterministic for
//! identical text — fingerprint-based skip logic depends on unchanged
//! content producing unchanged vectors.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::Embedding;
use crate::error::{Result, StoreError};
use crate::similarity::normalize;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name of this provider.
    fn name(&self) -> &str;

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Default implementation: process sequentially.
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Check if the provider is usable (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// OpenAI-compatible embedding provider.
pub struct OpenAiProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    model: String,
}

impl OpenAiProvider {
    /// Create a provider reading the API key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        }
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(StoreError::ProviderNotConfigured)?;

        debug!(model = %self.model, "requesting embedding");

        let body = serde_json::json!({
            "input": text,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
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
            return Err(StoreError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiRequest(format!("API error: {error_text}")));
        }

        let result: EmbeddingApiResponse = response.json().await?;
        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidResponse("no embedding in response".to_string()))?
            .embedding;

        Ok(embedding)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingApiData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiData {
    embedding: Vec<f32>,
}

/// Deterministic local provider derived from content hashes.
///
/// Identical text always maps to the identical unit vector, which is
/// exactly the property the indexer's skip logic needs. No semantic
/// quality — intended for tests and offline smoke runs.
pub struct HashProvider {
    dimension: usize,
}

impl HashProvider {
    /// Create a provider with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut values = Vec::with_capacity(self.dimension);
        let mut counter: u64 = 0;
        while values.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(counter.to_le_bytes());
            hasher.update(text.as_bytes());
            let digest = hasher.finalize();
            for bytes in digest.chunks_exact(4) {
                if values.len() == self.dimension {
                    break;
                }
                let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                // Map to [-1.0, 1.0].
                values.push((raw as f32 / u32::MAX as f32) * 2.0 - 1.0);
            }
            counter += 1;
        }
        normalize(&mut values);
        Ok(values)
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn hash_provider_is_deterministic() {
        let provider = HashProvider::new(32);
        let a = provider.embed("the same text").await.unwrap();
        let b = provider.embed("the same text").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn hash_provider_distinguishes_texts() {
        let provider = HashProvider::new(32);
        let a = provider.embed("alpha").await.unwrap();
        let b = provider.embed("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn openai_provider_requires_api_key() {
        let provider = OpenAiProvider {
            api_key: None,
            base_url: "http://localhost:1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-3-small".to_string(),
        };
        let result = provider.embed("hello").await;
        assert!(matches!(result, Err(StoreError::ProviderNotConfigured)));
    }

    #[tokio::test]
    async fn openai_provider_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
                "model": "text-embedding-3-small",
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let embedding = provider.embed("hello").await.unwrap();
        assert_eq!(embedding.len(), 3);
    }

    #[tokio::test]
    async fn openai_provider_surfaces_rate_limits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let result = provider.embed("hello").await;
        assert!(matches!(
            result,
            Err(StoreError::RateLimited {
                retry_after_secs: 7
            })
        ));
    }
}
