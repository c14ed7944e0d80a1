//! Gemini API chat model
//!
//! Speaks the `generateContent` REST API with function calling.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::llm::{ChatModel, ChatRequest, ModelReply};
use crate::memory::{ConversationMessage, MessageRole};
use crate::models::{ToolCall, ToolSpec};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
    model_name: String,
    generation_config: GenerationConfig,
}

impl GeminiChatModel {
    pub fn new(model_id: &str, model_name: &str, api_key: &str) -> crate::Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::ModelInit(format!(
                "GEMINI_API_KEY not configured for model '{}'",
                model_id
            )));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::ModelInit(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            model_id: model_id.to_string(),
            model_name: model_name.to_string(),
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model_name
        )
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &ChatRequest) -> crate::Result<ModelReply> {
        let body = build_request(request, &self.generation_config);

        debug!(
            model = %self.model_name,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::Llm(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response ({}): {}", status, error_text);
            return Err(AgentError::Llm(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::Llm(format!("Gemini parse error: {}", e))
        })?;

        let reply = parse_reply(gemini_response)?;

        info!(
            tool_calls = reply.tool_calls.len(),
            "Gemini response received"
        );

        Ok(reply)
    }
}

/// Translate a chat request into the Gemini wire format
fn build_request(request: &ChatRequest, generation_config: &GenerationConfig) -> GenerateContentRequest {
    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: request.tools.iter().map(FunctionDeclaration::from).collect(),
        }]
    };

    GenerateContentRequest {
        contents: to_contents(&request.messages),
        system_instruction: request.system_prompt.as_ref().map(|prompt| Content {
            role: None,
            parts: vec![Part::text(prompt.clone())],
        }),
        tools,
        generation_config: generation_config.clone(),
    }
}

fn to_contents(messages: &[ConversationMessage]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(messages.len());

    for msg in messages {
        let (role, parts) = match msg.role {
            // Gemini has no system turn inside `contents`; summaries travel as user text
            MessageRole::User | MessageRole::System => ("user", vec![Part::text(msg.content.clone())]),
            MessageRole::Agent => {
                let mut parts = Vec::with_capacity(msg.tool_calls.len() + 1);
                if !msg.content.is_empty() {
                    parts.push(Part::text(msg.content.clone()));
                }
                for call in &msg.tool_calls {
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        }),
                        ..Part::default()
                    });
                }
                ("model", parts)
            }
            MessageRole::Tool => (
                "user",
                vec![Part {
                    function_response: Some(FunctionResponse {
                        name: msg.tool_name.clone().unwrap_or_default(),
                        response: json!({ "content": msg.content }),
                    }),
                    ..Part::default()
                }],
            ),
        };

        if parts.is_empty() {
            continue;
        }

        // Consecutive turns with the same role are merged
        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(Content {
                role: Some(role.to_string()),
                parts,
            }),
        }
    }

    contents
}

fn parse_reply(response: GenerateContentResponse) -> crate::Result<ModelReply> {
    if let Some(usage) = &response.usage_metadata {
        debug!(
            prompt_tokens = usage.prompt_token_count,
            candidate_tokens = usage.candidates_token_count,
            "Gemini usage"
        );
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Llm("No response from Gemini API".to_string()))?;

    let content = candidate.content.ok_or_else(|| {
        AgentError::Llm(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    let mut reply = ModelReply::default();

    for part in content.parts {
        if let Some(text) = part.text {
            reply.content.push_str(&text);
        }
        if let Some(call) = part.function_call {
            reply.tool_calls.push(ToolCall {
                id: format!("call_{}", Uuid::new_v4().simple()),
                name: call.name,
                arguments: call.args,
            });
        }
    }

    Ok(reply)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSpec> for FunctionDeclaration {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever_spec() -> ToolSpec {
        ToolSpec {
            name: "vml_retriever_tool".to_string(),
            description: "Retrieve top product reviews related to the user query.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        }
    }

    #[test]
    fn test_request_serialization() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "vml_retriever_tool".to_string(),
            arguments: json!({ "query": "battery life" }),
        };
        let request = ChatRequest {
            system_prompt: Some("You're an e-commerce bot".to_string()),
            messages: vec![
                ConversationMessage::user("How is the battery life?"),
                ConversationMessage::agent("", vec![call.clone()]),
                ConversationMessage::tool(&call, "Battery lasts 2 days"),
            ],
            tools: vec![retriever_spec()],
        };
        let config = GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        };

        let json = serde_json::to_value(build_request(&request, &config)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You're an e-commerce bot");
        assert_eq!(json["tools"][0]["functionDeclarations"][0]["name"], "vml_retriever_tool");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["query"], "battery life");
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["name"], "vml_retriever_tool");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["content"],
            "Battery lasts 2 days"
        );
    }

    #[test]
    fn test_same_role_turns_are_merged() {
        let messages = vec![
            ConversationMessage::summary("Earlier: asked about colors".to_string()),
            ConversationMessage::user("And the size?"),
        ];
        let contents = to_contents(&messages);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].parts.len(), 2);
    }

    #[test]
    fn test_parse_function_call_reply() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "vml_retriever_tool", "args": { "query": "battery" } } }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 3 }
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let reply = parse_reply(response).unwrap();

        assert!(reply.content.is_empty());
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "vml_retriever_tool");
        assert_eq!(reply.tool_calls[0].arguments["query"], "battery");
        assert!(reply.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_parse_text_reply_and_empty_candidates() {
        let raw = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Battery " }, { "text": "is great." }] }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parse_reply(response).unwrap().content, "Battery is great.");

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parse_reply(empty).is_err());
    }

    #[test]
    fn test_endpoint_uses_model_name() {
        let model = GeminiChatModel::new("google_genai:gemini-2.0-flash", "gemini-2.0-flash", "key")
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(
            model.endpoint(),
            "http://localhost:9999/models/gemini-2.0-flash:generateContent"
        );
    }
}
