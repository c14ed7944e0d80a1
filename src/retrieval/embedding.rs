//! Text embedders
//!
//! [`HashingEmbedder`] is deterministic and offline. [`GeminiEmbedder`]
//! calls the Gemini `batchEmbedContents` endpoint.

use crate::config::Config;
use crate::error::AgentError;
use crate::llm::gemini::GEMINI_BASE_URL;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Pick an embedder for the configured embedding model
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding_model.trim() {
        "" | "hashing" => {
            info!("Embedder: hashing");
            Ok(Arc::new(HashingEmbedder::default()))
        }
        model => {
            info!(model = %model, "Embedder: gemini");
            Ok(Arc::new(GeminiEmbedder::new(model, &config.gemini_api_key)?))
        }
    }
}

//
// ================= Hashing =================
//

/// Feature-hashed bag of words, L2-normalized
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

//
// ================= Gemini =================
//

/// Upper bound on texts per `batchEmbedContents` call
pub const MAX_EMBED_BATCH: usize = 100;

pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(model: &str, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::Embedding(format!(
                "GEMINI_API_KEY not configured for embedding model '{}'",
                model
            )));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AgentError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    /// Point the embedder at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/models/{}:batchEmbedContents", self.base_url, self.model);
        let model_path = format!("models/{}", self.model);
        let requests: Vec<_> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": model_path,
                    "content": { "parts": [{ "text": text }] }
                })
            })
            .collect();

        debug!(count = texts.len(), model = %self.model, "Requesting embeddings");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| AgentError::Embedding(format!("Gemini embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gemini embedding error response ({}): {}", status, body);
            return Err(AgentError::Embedding(format!(
                "Gemini embedding API returned {}: {}",
                status, body
            )));
        }

        let parsed: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Embedding(format!("Invalid embedding response: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(AgentError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        // batchEmbedContents rejects more than MAX_EMBED_BATCH requests per call
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
        }

        Ok(vectors)
    }
}
