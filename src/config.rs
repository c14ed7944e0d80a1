//! Runtime configuration
//!
//! Values come from the process environment. Binaries call `dotenv::dotenv()`
//! first so a local `.env` file can supply them.

use crate::error::AgentError;
use crate::Result;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_RAG_MODEL: &str = "google_genai:gemini-2.0-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "hashing";
pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_MAX_AGENT_STEPS: usize = 25;

#[derive(Debug, Clone)]
pub struct Config {
    /// Chat model selector, `<provider>:<model>` or a bare model name
    pub rag_model: String,
    pub gemini_api_key: String,
    /// `hashing` for the offline embedder, anything else is a Gemini embedding model
    pub embedding_model: String,
    pub documents_path: Option<PathBuf>,
    pub api_port: u16,
    pub max_agent_steps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rag_model: DEFAULT_RAG_MODEL.to_string(),
            gemini_api_key: String::new(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            documents_path: None,
            api_port: DEFAULT_API_PORT,
            max_agent_steps: DEFAULT_MAX_AGENT_STEPS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                AgentError::Config(format!("PORT must be a port number, got {:?}: {}", raw, e))
            })?,
            None => defaults.api_port,
        };

        let max_agent_steps = match get("AGENT_MAX_STEPS") {
            Some(raw) => {
                let steps = raw.trim().parse::<usize>().map_err(|e| {
                    AgentError::Config(format!(
                        "AGENT_MAX_STEPS must be a positive integer, got {:?}: {}",
                        raw, e
                    ))
                })?;
                if steps == 0 {
                    return Err(AgentError::Config(
                        "AGENT_MAX_STEPS must be at least 1".to_string(),
                    ));
                }
                steps
            }
            None => defaults.max_agent_steps,
        };

        Ok(Self {
            rag_model: get("RAG_MODEL").unwrap_or(defaults.rag_model),
            gemini_api_key: get("GEMINI_API_KEY")
                .or_else(|| get("GOOGLE_API_KEY"))
                .unwrap_or_default(),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            documents_path: get("VMLMAP_DOCUMENTS").map(PathBuf::from),
            api_port,
            max_agent_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.rag_model, DEFAULT_RAG_MODEL);
        assert_eq!(config.embedding_model, "hashing");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.max_agent_steps, 25);
        assert!(config.documents_path.is_none());
        assert!(config.gemini_api_key.is_empty());
    }

    #[test]
    fn test_values_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("RAG_MODEL", "mock:echo"),
            ("GOOGLE_API_KEY", "abc"),
            ("API_PORT", "9000"),
            ("VMLMAP_DOCUMENTS", "data/reviews.jsonl"),
            ("AGENT_MAX_STEPS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.rag_model, "mock:echo");
        assert_eq!(config.gemini_api_key, "abc");
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.max_agent_steps, 5);
        assert_eq!(
            config.documents_path,
            Some(PathBuf::from("data/reviews.jsonl"))
        );
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("AGENT_MAX_STEPS", "0")])).is_err());
    }
}
