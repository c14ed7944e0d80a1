//! Agent Memory System
//!
//! Provides conversation history, per-thread checkpointing, and automatic
//! summarization so the agent remembers context across turns

pub mod checkpoint;
pub mod store;
pub mod summarizer;

pub use checkpoint::{Checkpointer, InMemorySaver};
pub use store::{ConversationHistory, ConversationMessage, MessageRole};
pub use summarizer::{AgentMiddleware, ContextSize, SummarizationMiddleware};
