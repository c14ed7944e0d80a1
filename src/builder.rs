//! Product Q&A agent assembly
//!
//! Wires a vector store into the retrieval tool and hands it, with the chat
//! model, system prompt, checkpointer and summarization middleware, to
//! [`create_agent`].

use crate::agent::{create_agent, Agent, AgentOptions};
use crate::config::Config;
use crate::llm::{init_chat_model, ChatModel};
use crate::memory::{ContextSize, InMemorySaver, SummarizationMiddleware};
use crate::retrieval::{as_retriever, VectorStore};
use crate::tools::build_retriever_tool;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Documents returned per retrieval
pub const RETRIEVER_TOP_K: usize = 3;
/// History length that triggers summarization
pub const SUMMARY_TRIGGER_MESSAGES: usize = 10;
/// Recent messages kept verbatim after summarization
pub const SUMMARY_KEEP_MESSAGES: usize = 4;

pub const SYSTEM_PROMPT: &str = "You're an e-commerce bot answering product-related queries \
based on reviews and titles.

To find the answers always use vml_retriever_tool.

If you do not know an answer, politely say: I don't know the answer, please contact \
our customer care +1 437-973-****.";

pub struct RagAgentBuilder {
    vector_store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
    max_steps: usize,
}

impl RagAgentBuilder {
    /// Initialize the configured chat model; fails if the model id is invalid
    pub fn new(vector_store: Arc<dyn VectorStore>, config: &Config) -> Result<Self> {
        let model = init_chat_model(&config.rag_model, &config.gemini_api_key)?;
        Ok(Self {
            vector_store,
            model,
            max_steps: config.max_agent_steps,
        })
    }

    /// Use an already constructed chat model
    pub fn with_model(vector_store: Arc<dyn VectorStore>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            vector_store,
            model,
            max_steps: crate::config::DEFAULT_MAX_AGENT_STEPS,
        }
    }

    pub fn build_agent(&self) -> Agent {
        let retriever = as_retriever(&self.vector_store, RETRIEVER_TOP_K);
        let retriever_tool = build_retriever_tool(Arc::new(retriever));

        info!(
            model = %self.model.model_id(),
            k = RETRIEVER_TOP_K,
            trigger = SUMMARY_TRIGGER_MESSAGES,
            keep = SUMMARY_KEEP_MESSAGES,
            "Building product Q&A agent"
        );

        create_agent(AgentOptions {
            model: Arc::clone(&self.model),
            tools: vec![Arc::new(retriever_tool)],
            system_prompt: SYSTEM_PROMPT.to_string(),
            checkpointer: Arc::new(InMemorySaver::new()),
            middleware: vec![Arc::new(SummarizationMiddleware::new(
                Arc::clone(&self.model),
                ContextSize::Messages(SUMMARY_TRIGGER_MESSAGES),
                ContextSize::Messages(SUMMARY_KEEP_MESSAGES),
            ))],
            max_steps: self.max_steps,
        })
    }
}
