//! vmlmap product Q&A agent
//!
//! A conversational retrieval agent for e-commerce product questions:
//! - Wraps a vector-store retriever (top 3 reviews) as a callable tool
//! - Registers that tool with a tool-calling chat agent
//! - Checkpoints each conversation thread in memory
//! - Summarizes long conversations before they overflow the context
//!
//! TURN LOOP:
//! QUERY → SUMMARIZE? → MODEL → RETRIEVE → MODEL → ANSWER

pub mod agent;
pub mod api;
pub mod builder;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod models;
pub mod retrieval;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{create_agent, Agent, AgentConfig, AgentOptions};
pub use builder::RagAgentBuilder;
pub use config::Config;
pub use models::*;
