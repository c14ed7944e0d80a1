//! In-memory vector store
//!
//! Brute-force cosine similarity over embedded documents.

use crate::error::AgentError;
use crate::models::Document;
use crate::retrieval::{Embedder, VectorStore};
use crate::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

struct StoredDocument {
    document: Document,
    embedding: Vec<f32>,
}

pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store documents, returning their ids
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AgentError::Embedding(format!(
                "Embedder returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let mut ids = Vec::with_capacity(documents.len());
        let mut entries = self.entries.write().await;

        for (mut document, embedding) in documents.into_iter().zip(embeddings) {
            let id = document
                .id
                .clone()
                .unwrap_or_else(|| content_id(&document.page_content));
            document.id = Some(id.clone());
            ids.push(id);
            entries.push(StoredDocument {
                document,
                embedding,
            });
        }

        info!(added = ids.len(), total = entries.len(), "Documents added to vector store");

        Ok(ids)
    }

    /// Top `k` documents with their cosine similarity, best first
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Embedding("Embedder returned no query vector".to_string()))?;

        let entries = self.entries.read().await;

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&query_embedding, &entry.embedding)))
            .collect();

        // Stable sort: ties keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        debug!(k, candidates = entries.len(), returned = scored.len(), "Similarity search");

        Ok(scored
            .into_iter()
            .map(|(i, score)| (entries[i].document.clone(), score))
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .similarity_search_with_score(query, k)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }
}

fn content_id(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(&hash[..8])
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
