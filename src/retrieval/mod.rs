//! Vector store and retriever abstractions
//!
//! A [`VectorStore`] ranks documents against a text query. A [`Retriever`]
//! is a store bound to a fixed result count, which is what tools consume.

use crate::models::Document;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub mod embedding;
pub mod in_memory;

pub use embedding::{build_embedder, Embedder, GeminiEmbedder, HashingEmbedder};
pub use in_memory::InMemoryVectorStore;

/// Storage that can return the k documents most similar to a query
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

/// Returns the relevant documents for a query
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn invoke(&self, query: &str) -> Result<Vec<Document>>;
}

/// A vector store bounded to its top `k` results per query
pub struct VectorStoreRetriever {
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl VectorStoreRetriever {
    pub fn new(store: Arc<dyn VectorStore>, k: usize) -> Self {
        Self { store, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn invoke(&self, query: &str) -> Result<Vec<Document>> {
        let docs = self.store.similarity_search(query, self.k).await?;
        debug!(k = self.k, returned = docs.len(), "Retriever invoked");
        Ok(docs)
    }
}

/// Bind a vector store to a result count
pub fn as_retriever(store: &Arc<dyn VectorStore>, k: usize) -> VectorStoreRetriever {
    VectorStoreRetriever::new(Arc::clone(store), k)
}
