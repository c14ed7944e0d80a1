//! Mock chat model for development & testing
//! Keeps the agent functional without an LLM dependency

use crate::llm::{ChatModel, ChatRequest, ModelReply};
use crate::memory::MessageRole;
use crate::models::ToolCall;
use crate::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

type Responder = Box<dyn Fn(&ChatRequest) -> Result<ModelReply> + Send + Sync>;

/// Answers from a responder closure and records every request it sees
pub struct MockChatModel {
    model_id: String,
    responder: Responder,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatModel {
    pub fn new<F>(model_id: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<ModelReply> + Send + Sync + 'static,
    {
        Self {
            model_id: model_id.into(),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Deterministic retrieval behaviour:
    /// - no tools offered (summarization call): a short digest of the transcript
    /// - last message is a user turn: call the first tool with that text as `query`
    /// - last message is a tool result: answer with the retrieved reviews
    pub fn retrieval_echo(model_id: impl Into<String>) -> Self {
        Self::new(model_id, |request| {
            let last = request.messages.last();

            if request.tools.is_empty() {
                return Ok(ModelReply::text(format!(
                    "Summary of {} earlier messages.",
                    request.messages.len()
                )));
            }

            match last {
                Some(msg) if msg.role == MessageRole::User => {
                    Ok(ModelReply::tool_call(ToolCall {
                        id: format!("call_{}", request.messages.len()),
                        name: request.tools[0].name.clone(),
                        arguments: json!({ "query": msg.content }),
                    }))
                }
                Some(msg) if msg.role == MessageRole::Tool && !msg.content.trim().is_empty() => Ok(
                    ModelReply::text(format!("Based on customer reviews:\n\n{}", msg.content)),
                ),
                _ => Ok(ModelReply::text(
                    "I don't know the answer, please contact our customer care +1 437-973-****.",
                )),
            }
        })
    }

    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ModelReply> {
        self.requests.lock().await.push(request.clone());
        (self.responder)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationMessage;
    use crate::models::ToolSpec;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "vml_retriever_tool".to_string(),
            description: "reviews".to_string(),
            parameters: json!({}),
        }
    }

    #[tokio::test]
    async fn test_retrieval_echo_calls_tool_then_answers() {
        let model = MockChatModel::retrieval_echo("mock:echo");

        let mut request = ChatRequest {
            system_prompt: None,
            messages: vec![ConversationMessage::user("battery life")],
            tools: vec![spec()],
        };
        let first = model.generate(&request).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].arguments["query"], "battery life");

        let call = first.tool_calls[0].clone();
        request.messages.push(ConversationMessage::agent("", vec![call.clone()]));
        request.messages.push(ConversationMessage::tool(&call, "Lasts all day"));
        let second = model.generate(&request).await.unwrap();
        assert!(second.tool_calls.is_empty());
        assert!(second.content.contains("Lasts all day"));

        assert_eq!(model.request_count().await, 2);
    }

    #[tokio::test]
    async fn test_retrieval_echo_falls_back_to_support() {
        let model = MockChatModel::retrieval_echo("mock:echo");
        let call = ToolCall {
            id: "c".to_string(),
            name: "vml_retriever_tool".to_string(),
            arguments: json!({ "query": "warranty" }),
        };
        let request = ChatRequest {
            system_prompt: None,
            messages: vec![ConversationMessage::tool(&call, "")],
            tools: vec![spec()],
        };
        let reply = model.generate(&request).await.unwrap();
        assert!(reply.content.contains("customer care"));
    }
}
