//! Chat model abstraction
//!
//! The agent loop and the summarization middleware talk to models only
//! through [`ChatModel`]. [`init_chat_model`] turns a configuration string
//! into a concrete model.

use crate::error::AgentError;
use crate::memory::ConversationMessage;
use crate::models::{ToolCall, ToolSpec};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub mod gemini;
pub mod mock;

pub use gemini::GeminiChatModel;
pub use mock::MockChatModel;

/// One model call: prompt, transcript and the tools the model may request
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ConversationMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Model output: text, tool calls, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![call],
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier the model was initialized with, e.g. `google_genai:gemini-2.0-flash`
    fn model_id(&self) -> &str;

    async fn generate(&self, request: &ChatRequest) -> Result<ModelReply>;
}

/// Initialize a chat model from `<provider>:<model>` or a bare model name
pub fn init_chat_model(model_id: &str, api_key: &str) -> Result<Arc<dyn ChatModel>> {
    let (provider, model_name) = parse_model_id(model_id)?;

    info!(provider = %provider, model = %model_name, "Initializing chat model");

    match provider.as_str() {
        "google_genai" | "google" | "gemini" => Ok(Arc::new(GeminiChatModel::new(
            model_id.trim(),
            &model_name,
            api_key,
        )?)),
        "mock" => Ok(Arc::new(MockChatModel::retrieval_echo(model_id.trim()))),
        other => Err(AgentError::ModelInit(format!(
            "Unsupported model provider '{}' in '{}'",
            other, model_id
        ))),
    }
}

/// Split a model identifier into (provider, model name)
pub fn parse_model_id(model_id: &str) -> Result<(String, String)> {
    let model_id = model_id.trim();

    let (provider, model_name) = match model_id.split_once(':') {
        Some((provider, name)) => (provider.trim().to_lowercase(), name.trim().to_string()),
        None => {
            let lowered = model_id.to_lowercase();
            let provider = if lowered.starts_with("gemini") {
                "google_genai"
            } else if lowered.starts_with("mock") {
                "mock"
            } else {
                return Err(AgentError::ModelInit(format!(
                    "Unable to infer model provider for '{}'; use '<provider>:<model>'",
                    model_id
                )));
            };
            (provider.to_string(), model_id.to_string())
        }
    };

    if provider.is_empty() || model_name.is_empty() {
        return Err(AgentError::ModelInit(format!(
            "Invalid model identifier '{}'",
            model_id
        )));
    }

    Ok((provider, model_name))
}
