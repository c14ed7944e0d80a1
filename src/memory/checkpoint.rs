//! Conversation checkpointing
//!
//! Persists each thread's history between agent turns.
//! Currently in-memory only; state is process-local.

use crate::memory::store::ConversationHistory;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for conversation state persistence
#[async_trait::async_trait]
pub trait Checkpointer: Send + Sync {
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationHistory>>;
    async fn put(&self, thread_id: &str, history: &ConversationHistory) -> Result<()>;
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// In-memory checkpointer keyed by thread id
pub struct InMemorySaver {
    threads: Arc<RwLock<HashMap<String, ConversationHistory>>>,
}

impl InMemorySaver {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Checkpointer for InMemorySaver {
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationHistory>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, history: &ConversationHistory) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.insert(thread_id.to_string(), history.clone());
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.remove(thread_id);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let threads = self.threads.read().await;
        let mut ids: Vec<String> = threads.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::ConversationMessage;

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let saver = InMemorySaver::new();
        assert!(saver.get("t1").await.unwrap().is_none());

        let mut history = ConversationHistory::new("t1");
        history.add_message(ConversationMessage::user("Does it fold?"));
        saver.put("t1", &history).await.unwrap();

        let loaded = saver.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.message_count(), 1);
        assert_eq!(loaded.thread_id, "t1");
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let saver = InMemorySaver::new();

        let mut first = ConversationHistory::new("a");
        first.add_message(ConversationMessage::user("first"));
        saver.put("a", &first).await.unwrap();
        saver.put("b", &ConversationHistory::new("b")).await.unwrap();

        assert_eq!(saver.get("a").await.unwrap().unwrap().message_count(), 1);
        assert_eq!(saver.get("b").await.unwrap().unwrap().message_count(), 0);
        assert_eq!(saver.list_threads().await.unwrap(), vec!["a", "b"]);

        saver.delete_thread("a").await.unwrap();
        assert!(saver.get("a").await.unwrap().is_none());
        assert_eq!(saver.list_threads().await.unwrap(), vec!["b"]);
    }
}
