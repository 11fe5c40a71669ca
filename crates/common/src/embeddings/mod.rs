//! Embedding service abstraction
//!
//! The embedding model is an external collaborator. Callers build one handle
//! with [`create_embedder`] and pass it explicitly to whatever needs it;
//! nothing here caches a model globally.
//!
//! Providers:
//! - OpenAI-compatible HTTP endpoints (text-embedding-3-small, self-hosted SPECTER/SciBERT servers)
//! - Deterministic mock (hash-seeded) for tests and offline runs

mod text;

pub use text::{clean_text, prepare_text};

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::models::Paper;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures::stream::{self, StreamExt, TryStreamExt};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI-compatible embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI-compatible embedder
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let dimension = match config.model.as_str() {
            "text-embedding-ada-002" => 1536,
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => config.dimension,
        };

        let timeout = config.timeout();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries,
            timeout,
        })
    }

    /// Make request with exponential backoff on transient failures
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(self.timeout * (self.max_retries + 1)))
            .build();

        backoff::future::retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.make_request(texts).await {
                Ok(embeddings) => Ok(embeddings),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let started = Instant::now();

        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::EmbeddingTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    AppError::EmbeddingError {
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            crate::metrics::record_embedding(0.0, &self.model, texts.len(), false);

            let message = format!("API error {}: {}", status, body);
            // 4xx other than rate limiting will not improve on retry
            if status.is_client_error() && status.as_u16() != 429 {
                return Err(AppError::Validation { message, field: None });
            }
            return Err(AppError::EmbeddingError { message });
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to parse response: {}", e),
        })?;

        crate::metrics::record_embedding(
            started.elapsed().as_secs_f64(),
            &self.model,
            texts.len(),
            true,
        );

        if result.data.len() != texts.len() {
            return Err(AppError::InvalidFormat {
                message: format!(
                    "Embedding API returned {} vectors for {} inputs",
                    result.data.len(),
                    texts.len()
                ),
            });
        }

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // OpenAI caps inputs per request well above this
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock embedder for testing
///
/// Vectors are derived from a SHA-256 of the text, so the same text always
/// maps to the same embedding.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let seed: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let mut rng = StdRng::from_seed(seed);
        (0..self.dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(config, key)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

/// Fill in embeddings for papers that do not have one yet
///
/// Texts are built with [`prepare_text`]; batches run with bounded
/// concurrency. Returns the number of papers embedded.
pub async fn embed_missing(
    embedder: &dyn Embedder,
    papers: &mut [Paper],
    batch_size: usize,
    concurrency: usize,
) -> Result<usize> {
    let pending: Vec<usize> = papers
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_embedded())
        .map(|(i, _)| i)
        .collect();

    if pending.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = pending
        .iter()
        .map(|&i| prepare_text(&papers[i].title, &papers[i].abstract_text))
        .collect();

    tracing::info!(
        papers = pending.len(),
        model = embedder.model_name(),
        batch_size,
        "Embedding papers"
    );

    let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(batch_size.max(1)))
        .map(|chunk| embedder.embed_batch(chunk))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let expected = embedder.dimension();
    for (&index, embedding) in pending.iter().zip(batches.into_iter().flatten()) {
        if embedding.len() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        papers[index].embedding = Some(embedding);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder() {
        let embedder = MockEmbedder::new(768);
        let embedding = embedder.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 768);
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let embedder = MockEmbedder::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings[0], embeddings[2]);
        assert_ne!(embeddings[0], embeddings[1]);
    }

    #[tokio::test]
    async fn test_embed_missing_skips_embedded() {
        let embedder = MockEmbedder::new(4);
        let mut papers = vec![
            Paper::new("a").with_title("Alpha").with_embedding(vec![1.0, 0.0, 0.0, 0.0]),
            Paper::new("b").with_title("Beta").with_abstract("Beta decay in physics"),
            Paper::new("c").with_title("Gamma"),
        ];

        let count = embed_missing(&embedder, &mut papers, 1, 2).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(papers[0].embedding.as_deref(), Some(&[1.0, 0.0, 0.0, 0.0][..]));
        assert_eq!(papers[1].embedding.as_ref().map(Vec::len), Some(4));
        assert!(papers[2].is_embedded());
    }

    #[test]
    fn test_default_dimension_matches_default_model() {
        let config = EmbeddingConfig::default();
        let openai = OpenAIEmbedder::new(&config, "sk-test".to_string()).unwrap();
        let mock = create_embedder(&config).unwrap();
        assert_eq!(openai.dimension(), config.dimension);
        assert_eq!(mock.dimension(), openai.dimension());
    }

    #[test]
    fn test_create_embedder_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        let err = create_embedder(&config).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
