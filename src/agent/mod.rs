//! Tool-calling agent loop
//!
//! INPUT → MIDDLEWARE → MODEL → TOOLS? → MODEL → ... → ANSWER
//!
//! Each turn loads the thread from the checkpointer, runs until the model
//! answers without requesting tools, and saves the thread back.

use crate::config::DEFAULT_MAX_AGENT_STEPS;
use crate::error::AgentError;
use crate::llm::{ChatModel, ChatRequest};
use crate::memory::{AgentMiddleware, Checkpointer, ConversationHistory, ConversationMessage};
use crate::models::{AgentResponse, ToolCall, ToolInput};
use crate::tools::{Tool, ToolRegistry};
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything `create_agent` needs
pub struct AgentOptions {
    pub model: Arc<dyn ChatModel>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub system_prompt: String,
    pub checkpointer: Arc<dyn Checkpointer>,
    pub middleware: Vec<Arc<dyn AgentMiddleware>>,
    pub max_steps: usize,
}

impl AgentOptions {
    pub fn new(model: Arc<dyn ChatModel>, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            model,
            tools: Vec::new(),
            system_prompt: String::new(),
            checkpointer,
            middleware: Vec::new(),
            max_steps: DEFAULT_MAX_AGENT_STEPS,
        }
    }
}

/// Inspectable snapshot of an agent's construction parameters
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub model: String,
    pub tools: Vec<String>,
    pub system_prompt: String,
    pub middleware: Vec<Value>,
    pub max_steps: usize,
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: String,
    checkpointer: Arc<dyn Checkpointer>,
    middleware: Vec<Arc<dyn AgentMiddleware>>,
    max_steps: usize,
}

/// Assemble an agent from its parts
pub fn create_agent(options: AgentOptions) -> Agent {
    let tools: ToolRegistry = options.tools.into_iter().collect();

    info!(
        model = %options.model.model_id(),
        tools = ?tools.list(),
        middleware = options.middleware.len(),
        "Agent created"
    );

    Agent {
        model: options.model,
        tools,
        system_prompt: options.system_prompt,
        checkpointer: options.checkpointer,
        middleware: options.middleware,
        max_steps: options.max_steps.max(1),
    }
}

impl Agent {
    pub fn config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.model_id().to_string(),
            tools: self.tools.list().into_iter().map(String::from).collect(),
            system_prompt: self.system_prompt.clone(),
            middleware: self.middleware.iter().map(|m| m.describe()).collect(),
            max_steps: self.max_steps,
        }
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Checkpointed history of a thread, if any
    pub async fn history(&self, thread_id: &str) -> Result<Option<ConversationHistory>> {
        self.checkpointer.get(thread_id).await
    }

    /// Run one conversational turn on a thread
    pub async fn invoke(&self, thread_id: &str, query: &str) -> Result<AgentResponse> {
        let start_time = Instant::now();

        info!(thread_id = %thread_id, "Agent: starting turn");

        let mut history = self
            .checkpointer
            .get(thread_id)
            .await?
            .unwrap_or_else(|| ConversationHistory::new(thread_id));

        history.add_message(ConversationMessage::user(query));

        let tool_specs = self.tools.specs();
        let mut tool_calls_made: Vec<ToolCall> = Vec::new();

        for step in 1..=self.max_steps {
            for middleware in &self.middleware {
                middleware.before_model(&mut history).await?;
            }

            let request = ChatRequest {
                system_prompt: Some(self.system_prompt.clone()),
                messages: history.messages().cloned().collect(),
                tools: tool_specs.clone(),
            };

            let reply = self.model.generate(&request).await?;

            debug!(
                thread_id = %thread_id,
                step,
                tool_calls = reply.tool_calls.len(),
                "Model replied"
            );

            if reply.tool_calls.is_empty() {
                history.add_message(ConversationMessage::agent(reply.content.clone(), Vec::new()));
                self.checkpointer.put(thread_id, &history).await?;

                info!(
                    thread_id = %thread_id,
                    steps = step,
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Agent: turn complete"
                );

                return Ok(AgentResponse {
                    thread_id: thread_id.to_string(),
                    answer: reply.content,
                    tool_calls: tool_calls_made,
                    message_count: history.message_count(),
                });
            }

            history.add_message(ConversationMessage::agent(
                reply.content.clone(),
                reply.tool_calls.clone(),
            ));

            for call in &reply.tool_calls {
                let content = self.run_tool(call).await?;
                history.add_message(ConversationMessage::tool(call, content));
                tool_calls_made.push(call.clone());
            }
        }

        warn!(
            thread_id = %thread_id,
            max_steps = self.max_steps,
            "Agent stopped without a final answer"
        );

        Err(AgentError::RecursionLimit(self.max_steps))
    }

    /// Execute a tool call and render its result as message text
    ///
    /// Unknown tools and bad arguments are reported back to the model;
    /// every other failure aborts the turn.
    async fn run_tool(&self, call: &ToolCall) -> Result<String> {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return Ok(format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                self.tools.list().join(", ")
            ));
        };

        let input = ToolInput {
            tool_name: call.name.clone(),
            parameters: call.arguments.clone(),
        };

        let started = Instant::now();
        match tool.execute(&input).await {
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                Ok(output.as_message_content())
            }
            Err(AgentError::InvalidToolInput(reason)) => {
                warn!(tool = %call.name, %reason, "Invalid tool input");
                Ok(format!("Error: {}", reason))
            }
            Err(e) => Err(e),
        }
    }
}
