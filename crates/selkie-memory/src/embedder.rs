//! Embedding generation for semantic recall
//!
//! The memory system consumes embeddings through the [`Embedder`] trait;
//! model internals stay outside this crate. [`MockEmbedder`] produces
//! deterministic vectors for tests, [`HttpEmbedder`] calls an
//! OpenAI-compatible `/embeddings` endpoint.

use crate::error::{MemoryError, MemoryResult};
use async_trait::async_trait;
use serde::Deserialize;

/// Dimension of the small sentence-transformer family
pub const EMBEDDING_DIM_384: usize = 384;

/// Dimension of OpenAI text-embedding-3-small
pub const EMBEDDING_DIM_1536: usize = 1536;

/// Trait for generating text embeddings
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of embeddings produced by this embedder
    fn dimension(&self) -> usize;

    /// Model name or identifier
    fn model_name(&self) -> &str;

    /// Embed a single text string into a unit vector
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    /// Embed multiple texts
    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Cosine similarity between two vectors of equal dimension
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vectors must have equal dimension");

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Deterministic embedder for tests
///
/// Maps text to a pseudo-random unit vector seeded by content. Not suitable
/// for real semantic search.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    /// Create a mock embedder with the given dimension
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be positive");
        Self { dimension }
    }

    /// Mock embedder with the common 384-dimension shape
    pub fn default_384() -> Self {
        Self::new(EMBEDDING_DIM_384)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::default_384()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimension];

        let mut seed: u64 = 0;
        for (i, &byte) in text.as_bytes().iter().enumerate() {
            seed = seed.wrapping_add(byte as u64 * (i as u64 + 1));
            seed = seed.wrapping_mul(31);
        }

        for (i, value) in embedding.iter_mut().enumerate() {
            let combined = seed.wrapping_add(i as u64);
            let hash = combined.wrapping_mul(0x517cc1b727220a95);
            *value = ((hash as i64) as f32) / (i64::MAX as f32);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        Ok(embedding)
    }
}

/// Configuration for the HTTP embedder
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// API key, if the endpoint requires one
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Expected embedding dimension
    pub dimension: usize,
}

impl HttpEmbedderConfig {
    /// Read configuration from `EMBEDDING_*` environment variables
    ///
    /// Returns None when `EMBEDDING_BASE_URL` is unset or the provider is
    /// explicitly disabled; callers fall back to keyword-dominated recall in
    /// that case.
    pub fn from_env() -> Option<Self> {
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            if matches!(provider.to_lowercase().as_str(), "none" | "off" | "disabled") {
                return None;
            }
        }
        let base_url = std::env::var("EMBEDDING_BASE_URL").ok().filter(|v| !v.is_empty())?;
        let model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let api_key = std::env::var("EMBEDDING_API_KEY")
            .or_else(|_| std::env::var("LLM_API_KEY"))
            .ok()
            .filter(|v| !v.is_empty());
        let dimension = std::env::var("EMBEDDING_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(EMBEDDING_DIM_1536);

        Some(Self {
            base_url,
            api_key,
            model,
            dimension,
        })
    }
}

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint
pub struct HttpEmbedder {
    config: HttpEmbedderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder
    pub fn new(config: HttpEmbedderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment, None when unconfigured
    pub fn from_env() -> Option<Self> {
        HttpEmbedderConfig::from_env().map(Self::new)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text]).await?;
        results.pop().ok_or_else(|| MemoryError::EmbeddingFailed {
            reason: "no embedding returned".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "input": texts,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MemoryError::EmbeddingFailed {
                reason: format!("request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::EmbeddingFailed {
                reason: format!("API error {}: {}", status, body),
            });
        }

        let parsed: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| MemoryError::EmbeddingFailed {
                    reason: format!("bad response body: {}", e),
                })?;

        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for embedding in &embeddings {
            if embedding.len() != self.config.dimension {
                return Err(MemoryError::DimensionMismatch {
                    store_dim: self.config.dimension,
                    embedder_dim: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }
}
