use crate::core::evidence::ChunkId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod client;

pub use client::{Backend, BackendError, ChatReply, HttpBackend};

#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Successful body of the chat endpoint.
#[derive(Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<SourcePayload>>,
}

#[derive(Deserialize)]
pub struct SourcePayload {
    pub chunk: ChunkId,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub word_count: u32,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_paragraph: bool,
    #[serde(default, deserialize_with = "lenient_float")]
    pub relevance: f64,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub message: Option<String>,
    pub successful_chunks: Option<u64>,
    pub total_chunks: Option<u64>,
}

impl UploadResponse {
    /// Server message verbatim, or a chunk count when it sent none.
    pub fn summary(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return message.trim().to_string();
        }
        match (self.successful_chunks, self.total_chunks) {
            (Some(ok), Some(total)) => format!("Indexed {ok} of {total} chunks."),
            _ => "Upload complete.".to_string(),
        }
    }
}

// Retrieval metadata is loosely typed upstream ("Unknown" stands in for
// missing counts), so these fall back to defaults instead of failing the
// whole answer.

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::String(text) => {
            matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "1"
            )
        }
        Value::Number(number) => number.as_i64().map(|n| n != 0).unwrap_or(false),
        _ => false,
    })
}

fn lenient_float<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_summary_prefers_server_message() {
        let with_message = UploadResponse {
            message: Some("Successfully uploaded and indexed 2 out of 3 chunks.".to_string()),
            successful_chunks: Some(2),
            total_chunks: Some(3),
        };
        assert_eq!(
            with_message.summary(),
            "Successfully uploaded and indexed 2 out of 3 chunks."
        );

        let counts_only: UploadResponse =
            serde_json::from_str(r#"{"successful_chunks":1,"total_chunks":4}"#).unwrap();
        assert_eq!(counts_only.summary(), "Indexed 1 of 4 chunks.");

        let bare: UploadResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.summary(), "Upload complete.");
    }

    #[test]
    fn request_body_carries_only_the_message() {
        let body = serde_json::to_value(ChatRequest { message: "What is X?" }).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "What is X?" }));
    }

    #[test]
    fn response_without_sources_parses() {
        let response: ChatResponse = serde_json::from_str(r#"{"answer":"X is Y."}"#).unwrap();
        assert_eq!(response.answer, "X is Y.");
        assert!(response.sources.is_none());
    }

    #[test]
    fn sources_parse_with_full_metadata() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "answer": "X is Y.",
            "sources": [{
                "chunk": 3,
                "source": "doc.pdf",
                "content": "...",
                "word_count": 42,
                "is_paragraph": true,
                "relevance": 0.91
            }]
        }))
        .unwrap();
        let sources = response.sources.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].chunk.as_str(), "3");
        assert_eq!(sources[0].word_count, 42);
        assert!(sources[0].is_paragraph);
        assert!((sources[0].relevance - 0.91).abs() < f64::EPSILON);
    }

    #[test]
    fn loosely_typed_metadata_falls_back_to_defaults() {
        let source: SourcePayload = serde_json::from_value(serde_json::json!({
            "chunk": "Unknown chunk",
            "word_count": "Unknown",
            "is_paragraph": null,
            "relevance": "0.4"
        }))
        .unwrap();
        assert_eq!(source.chunk.as_str(), "Unknown chunk");
        assert_eq!(source.word_count, 0);
        assert!(!source.is_paragraph);
        assert!((source.relevance - 0.4).abs() < f64::EPSILON);
    }
}
