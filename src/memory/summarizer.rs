//! Context Summarization
//!
//! Middleware hooks run before every model call. [`SummarizationMiddleware`]
//! compresses old conversation turns into a single summary message once the
//! history grows past a trigger, keeping a fixed tail of recent messages.

use crate::error::AgentError;
use crate::llm::{ChatModel, ChatRequest};
use crate::memory::store::{format_messages, ConversationHistory, ConversationMessage, MessageRole};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const SUMMARY_PREFIX: &str = "Here is a summary of the conversation to date:";

const SUMMARY_PROMPT: &str = r#"You are summarizing a customer conversation with an e-commerce product assistant.

Your task is to create a concise summary of the conversation below so the assistant can keep answering follow-up questions.
Focus on:
1. Products and features the customer asked about
2. Facts taken from product reviews and titles
3. Questions the assistant could not answer
4. Any preferences the customer expressed

Keep it short and factual. Format as bullet points."#;

/// Hook invoked by the agent loop before each model call
#[async_trait]
pub trait AgentMiddleware: Send + Sync {
    fn name(&self) -> &str;

    /// Serializable view of this middleware's parameters
    fn describe(&self) -> Value;

    async fn before_model(&self, history: &mut ConversationHistory) -> Result<()>;
}

/// A history size threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContextSize {
    Messages(usize),
    Tokens(usize),
}

impl ContextSize {
    fn reached_by(&self, history: &ConversationHistory) -> bool {
        match *self {
            ContextSize::Messages(limit) => history.message_count() >= limit,
            ContextSize::Tokens(limit) => history.total_tokens() >= limit,
        }
    }
}

/// Summarizes conversation context with a chat model
pub struct SummarizationMiddleware {
    model: Arc<dyn ChatModel>,
    trigger: ContextSize,
    keep: ContextSize,
}

impl SummarizationMiddleware {
    pub fn new(model: Arc<dyn ChatModel>, trigger: ContextSize, keep: ContextSize) -> Self {
        Self {
            model,
            trigger,
            keep,
        }
    }

    pub fn trigger(&self) -> ContextSize {
        self.trigger
    }

    pub fn keep(&self) -> ContextSize {
        self.keep
    }

    /// Index of the first message to keep verbatim
    ///
    /// Never lands on a tool message, so a tool result is never separated
    /// from the agent message that requested it.
    pub fn find_cutoff(&self, history: &ConversationHistory) -> usize {
        let total = history.message_count();

        let mut cutoff = match self.keep {
            ContextSize::Messages(keep) => total.saturating_sub(keep),
            ContextSize::Tokens(budget) => {
                let mut used = 0;
                let mut cutoff = total;
                for msg in history.recent_messages(total) {
                    if used + msg.token_count > budget {
                        break;
                    }
                    used += msg.token_count;
                    cutoff -= 1;
                }
                // The newest message survives even when it alone exceeds the budget
                cutoff.min(total.saturating_sub(1))
            }
        };

        while cutoff > 0
            && history
                .get(cutoff)
                .map(|m| m.role == MessageRole::Tool)
                .unwrap_or(false)
        {
            cutoff -= 1;
        }

        cutoff
    }

    /// Summarize a set of messages into a concise summary message
    pub async fn summarize_messages(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<ConversationMessage> {
        if messages.is_empty() {
            return Err(AgentError::Summarization(
                "Cannot summarize empty message list".to_string(),
            ));
        }

        let conversation_text = format_messages(messages.iter());
        let request = ChatRequest {
            system_prompt: Some(SUMMARY_PROMPT.to_string()),
            messages: vec![ConversationMessage::user(format!(
                "CONVERSATION:\n---\n{}---\n\nSUMMARY:",
                conversation_text
            ))],
            tools: Vec::new(),
        };

        info!("Summarizing {} messages", messages.len());

        let reply = self.model.generate(&request).await?;
        let summary = reply.content.trim();

        if summary.is_empty() {
            return Err(AgentError::Summarization(
                "Model returned an empty summary".to_string(),
            ));
        }

        Ok(ConversationMessage::summary(format!(
            "{}\n\n{}",
            SUMMARY_PREFIX, summary
        )))
    }
}

fn size_json(size: ContextSize) -> Value {
    match size {
        ContextSize::Messages(n) => json!({ "messages": n }),
        ContextSize::Tokens(n) => json!({ "tokens": n }),
    }
}

#[async_trait]
impl AgentMiddleware for SummarizationMiddleware {
    fn name(&self) -> &str {
        "summarization"
    }

    fn describe(&self) -> Value {
        json!({
            "name": self.name(),
            "model": self.model.model_id(),
            "trigger": size_json(self.trigger),
            "keep": size_json(self.keep),
        })
    }

    async fn before_model(&self, history: &mut ConversationHistory) -> Result<()> {
        if !self.trigger.reached_by(history) {
            return Ok(());
        }

        let cutoff = self.find_cutoff(history);
        if cutoff == 0 {
            return Ok(());
        }

        info!(
            thread_id = %history.thread_id,
            messages = history.message_count(),
            tokens = history.total_tokens(),
            cutoff,
            "History reached summarization trigger"
        );

        let to_summarize = history.get_messages_to_summarize(cutoff);

        match self.summarize_messages(&to_summarize).await {
            Ok(summary) => {
                history.compact(cutoff, summary);
                info!(
                    thread_id = %history.thread_id,
                    remaining = history.message_count(),
                    "Compacted conversation history"
                );
            }
            Err(e) => {
                warn!("Failed to summarize context: {}. Continuing without summarization", e);
            }
        }

        Ok(())
    }
}
