//! Conversation history storage
//!
//! Stores and manages conversation messages with timestamps and metadata

use crate::models::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
    System,
    Tool,
}

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
    /// Approximate token count for context window management
    pub token_count: usize,
    /// If this message replaces summarized history
    pub is_summary: bool,
    /// Tool invocations requested by an agent message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages: the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

fn estimate_tokens(content: &str) -> usize {
    (content.len() + 3) / 4
}

impl ConversationMessage {
    /// Create a new conversation message
    pub fn new(role: MessageRole, content: String) -> Self {
        let token_count = estimate_tokens(&content);

        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
            token_count,
            is_summary: false,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    pub fn agent(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(MessageRole::Agent, content.into());
        // Tool call arguments occupy context too
        msg.token_count += tool_calls
            .iter()
            .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments.to_string()))
            .sum::<usize>();
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create the result message for a tool call
    pub fn tool(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Tool, content.into());
        msg.tool_call_id = Some(call.id.clone());
        msg.tool_name = Some(call.name.clone());
        msg
    }

    /// Create a summary message
    pub fn summary(summary_content: String) -> Self {
        let mut msg = Self::new(MessageRole::System, summary_content);
        msg.is_summary = true;
        msg
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Conversation history for one thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Messages in conversation (VecDeque for efficient queue operations)
    messages: VecDeque<ConversationMessage>,
    /// Total token count (approximate)
    total_tokens: usize,
}

impl ConversationHistory {
    /// Create a new conversation history
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: VecDeque::new(),
            total_tokens: 0,
        }
    }

    /// Add a message to history
    pub fn add_message(&mut self, message: ConversationMessage) {
        self.total_tokens += message.token_count;
        self.messages.push_back(message);
        self.updated_at = Utc::now();
    }

    // =============================
    // Iterators (ZERO ALLOCATION)
    // =============================

    /// Iterate over all messages
    pub fn messages(&self) -> impl DoubleEndedIterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    /// Iterate over recent messages (N most recent, newest first)
    pub fn recent_messages(
        &self,
        count: usize,
    ) -> impl DoubleEndedIterator<Item = &ConversationMessage> {
        self.messages.iter().rev().take(count)
    }

    pub fn get(&self, index: usize) -> Option<&ConversationMessage> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.back()
    }

    /// Get total token count
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Get message count
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Recompute token count (prevents drift)
    fn recompute_total_tokens(&mut self) {
        self.total_tokens = self.messages.iter().map(|m| m.token_count).sum();
    }

    /// Get formatted conversation (useful for summarization prompts)
    pub fn get_formatted_context(&self) -> String {
        format_messages(self.messages.iter())
    }

    /// Clone the messages before `until_index`
    pub fn get_messages_to_summarize(&self, until_index: usize) -> Vec<ConversationMessage> {
        self.messages.iter().take(until_index).cloned().collect()
    }

    /// Replace everything before `cutoff` with a single summary message
    pub fn compact(&mut self, cutoff: usize, summary: ConversationMessage) {
        let cutoff = cutoff.min(self.messages.len());
        self.messages.drain(..cutoff);
        self.messages.push_front(summary);
        self.recompute_total_tokens();
        self.updated_at = Utc::now();
    }
}

/// Render messages as `Role: content` lines
pub fn format_messages<'a>(messages: impl Iterator<Item = &'a ConversationMessage>) -> String {
    let mut text = String::new();

    for msg in messages {
        let role_str = match msg.role {
            MessageRole::User => "User",
            MessageRole::Agent => "Agent",
            MessageRole::System => "System",
            MessageRole::Tool => "Tool",
        };

        if msg.has_tool_calls() {
            let names: Vec<&str> = msg.tool_calls.iter().map(|c| c.name.as_str()).collect();
            text.push_str(&format!(
                "{}: {} [called tools: {}]\n",
                role_str,
                msg.content,
                names.join(", ")
            ));
        } else {
            text.push_str(&format!("{}: {}\n", role_str, msg.content));
        }
    }

    text
}
