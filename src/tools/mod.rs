//! Tool trait and registry
//!
//! Tools are what the model may call during the agent loop.
//! The retriever tool exposes product review search.

use crate::error::AgentError;
use crate::models::{ToolInput, ToolOutput, ToolSpec};
use crate::retrieval::Retriever;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const RETRIEVER_TOOL_NAME: &str = "vml_retriever_tool";
pub const RETRIEVER_TOOL_DESCRIPTION: &str =
    "Retrieve top product reviews related to the user query.";

/// Separator placed between retrieved documents
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the tool's parameters
    fn parameters(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Function declarations for the model, sorted by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

fn require_query(input: &ToolInput) -> Result<&str> {
    input
        .parameters
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            AgentError::InvalidToolInput(format!(
                "Expected string 'query' in {} input",
                input.tool_name
            ))
        })
}

/// Product review search over a retriever
pub struct RetrieverTool {
    retriever: Arc<dyn Retriever>,
}

impl RetrieverTool {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self { retriever }
    }

    /// Retrieve and join document contents with a blank line
    pub async fn run(&self, query: &str) -> Result<String> {
        let docs = self.retriever.invoke(query).await?;
        debug!(query = %query, documents = docs.len(), "Retriever tool ran");

        Ok(docs
            .iter()
            .map(|doc| doc.content())
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR))
    }
}

#[async_trait::async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &'static str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        RETRIEVER_TOOL_DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What the customer wants to know about the product"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let query = require_query(input)?;
        let text = self.run(query).await?;
        Ok(ToolOutput::text(text))
    }
}

/// Wrap a retriever as the product review tool
pub fn build_retriever_tool(retriever: Arc<dyn Retriever>) -> RetrieverTool {
    RetrieverTool::new(retriever)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use async_trait::async_trait;

    struct FixedRetriever(Vec<&'static str>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn invoke(&self, _query: &str) -> Result<Vec<Document>> {
            Ok(self.0.iter().map(|t| Document::new(*t)).collect())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn invoke(&self, _query: &str) -> Result<Vec<Document>> {
            Err(AgentError::Retrieval("index offline".to_string()))
        }
    }

    fn input(parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: RETRIEVER_TOOL_NAME.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_joins_with_blank_line() {
        let tool = build_retriever_tool(Arc::new(FixedRetriever(vec!["T1", "T2", "T3"])));
        assert_eq!(tool.run("battery").await.unwrap(), "T1\n\nT2\n\nT3");

        let single = build_retriever_tool(Arc::new(FixedRetriever(vec!["only"])));
        assert_eq!(single.run("battery").await.unwrap(), "only");
    }

    #[tokio::test]
    async fn test_empty_results_give_empty_string() {
        let tool = build_retriever_tool(Arc::new(FixedRetriever(vec![])));
        let output = tool.execute(&input(json!({ "query": "warranty" }))).await.unwrap();
        assert_eq!(output.data, json!(""));
        assert_eq!(output.as_message_content(), "");
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid_input() {
        let tool = build_retriever_tool(Arc::new(FixedRetriever(vec!["T1"])));
        let result = tool.execute(&input(json!({ "q": 1 }))).await;
        assert!(matches!(result, Err(AgentError::InvalidToolInput(_))));
    }

    #[tokio::test]
    async fn test_retriever_failure_propagates() {
        let tool = build_retriever_tool(Arc::new(FailingRetriever));
        let result = tool.execute(&input(json!({ "query": "battery" }))).await;
        assert!(matches!(result, Err(AgentError::Retrieval(_))));
    }

    #[test]
    fn test_registry() {
        let tool: Arc<dyn Tool> = Arc::new(build_retriever_tool(Arc::new(FixedRetriever(vec![]))));
        let registry: ToolRegistry = std::iter::once(tool).collect();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list(), vec![RETRIEVER_TOOL_NAME]);
        assert!(registry.get(RETRIEVER_TOOL_NAME).is_some());
        assert!(registry.get("web_search").is_none());

        let specs = registry.specs();
        assert_eq!(specs[0].name, RETRIEVER_TOOL_NAME);
        assert_eq!(specs[0].parameters["required"], json!(["query"]));
    }
}
