//! Product review ingestion
//!
//! Reads review records from a JSON array or a JSON-lines file and turns
//! each one into a [`Document`] built from its title and review text.

use crate::error::AgentError;
use crate::models::Document;
use crate::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ReviewRecord {
    pub title: String,
    pub review: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<ReviewRecord> for Document {
    fn from(record: ReviewRecord) -> Self {
        let mut doc = Document::new(format!(
            "Title: {}\nReview: {}",
            record.title.trim(),
            record.review.trim()
        ));
        doc.metadata = record.extra;
        doc.metadata
            .insert("title".to_string(), Value::String(record.title));
        doc
    }
}

/// Load review documents from `path`
pub async fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AgentError::Ingest(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let documents = parse_documents(&raw)?;
    info!(path = %path.display(), documents = documents.len(), "Loaded review documents");
    Ok(documents)
}

/// Parse either a JSON array of records or one record per line
pub fn parse_documents(raw: &str) -> Result<Vec<Document>> {
    // Spreadsheet exports often lead with a UTF-8 byte order mark
    let raw = raw.trim_start_matches('\u{feff}');
    let trimmed = raw.trim_start();

    if trimmed.starts_with('[') {
        let records: Vec<ReviewRecord> = serde_json::from_str(trimmed)
            .map_err(|e| AgentError::Ingest(format!("Invalid review array: {}", e)))?;
        return Ok(records.into_iter().map(Document::from).collect());
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<ReviewRecord>(line)
                .map(Document::from)
                .map_err(|e| AgentError::Ingest(format!("Line {}: {}", i + 1, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_lines() {
        let raw = r#"
{"title": "Pulse Watch", "review": "Battery lasts a week.", "rating": 5}

{"title": "Pulse Watch", "review": "Strap broke after a month.", "rating": 2}
"#;
        let docs = parse_documents(raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content(), "Title: Pulse Watch\nReview: Battery lasts a week.");
        assert_eq!(docs[0].metadata["rating"], 5);
        assert_eq!(docs[1].metadata["title"], "Pulse Watch");
    }

    #[test]
    fn test_parse_json_array() {
        let raw = r#"[{"title": "Earbuds", "review": "Great noise cancelling"}]"#;
        let docs = parse_documents(raw).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content().contains("noise cancelling"));
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let lines = "\u{feff}{\"title\": \"Pulse Watch\", \"review\": \"Charges fast.\"}\n";
        let docs = parse_documents(lines).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content(), "Title: Pulse Watch\nReview: Charges fast.");

        let array = "\u{feff}[{\"title\": \"Pulse Watch\", \"review\": \"Runs warm.\"}]";
        assert_eq!(parse_documents(array).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_review_reports_line() {
        let raw = "{\"title\": \"A\", \"review\": \"ok\"}\n{\"title\": \"B\"}\n";
        let err = parse_documents(raw).unwrap_err();
        assert!(matches!(err, AgentError::Ingest(_)));
        assert!(err.to_string().contains("Line 2"));
    }

    #[tokio::test]
    async fn test_load_documents_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"title": "Lamp", "review": "Warm light"}}"#).unwrap();

        let docs = load_documents(file.path()).await.unwrap();
        assert_eq!(docs.len(), 1);

        let missing = load_documents("/definitely/not/here.jsonl").await;
        assert!(matches!(missing, Err(AgentError::Ingest(_))));
    }
}
