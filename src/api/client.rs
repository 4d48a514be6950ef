use std::error::Error as StdError;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use crate::api::{ChatRequest, ChatResponse, UploadResponse};
use crate::core::evidence::SourceChunk;
use crate::utils::url::resolve_endpoint;

/// Extensions the upload endpoint indexes.
pub const UPLOAD_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// A decoded answer from the chat endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

impl ChatReply {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceChunk>) -> Self {
        self.sources = sources;
        self
    }
}

impl From<ChatResponse> for ChatReply {
    fn from(response: ChatResponse) -> Self {
        Self {
            answer: response.answer,
            sources: response
                .sources
                .unwrap_or_default()
                .into_iter()
                .map(SourceChunk::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The request never produced an HTTP response.
    Transport(String),
    /// Non-2xx response.
    Status { status: u16, message: String },
    /// 2xx response whose body could not be understood.
    Decode(String),
    /// 2xx response carrying an `error` field.
    Rejected(String),
    /// A local file could not be prepared for upload.
    File(String),
}

impl BackendError {
    /// Text suitable for showing in the conversation.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Transport(detail) => {
                format!("Could not reach the server ({detail})")
            }
            BackendError::Status { message, .. } => message.clone(),
            BackendError::Decode(detail) => {
                format!("Unexpected response from the server ({detail})")
            }
            BackendError::Rejected(message) | BackendError::File(message) => message.clone(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(detail) => write!(f, "Request failed: {detail}"),
            BackendError::Status { status, message } => {
                write!(f, "Server returned status {status}: {message}")
            }
            BackendError::Decode(detail) => write!(f, "Invalid response body: {detail}"),
            BackendError::Rejected(message) => write!(f, "Server error: {message}"),
            BackendError::File(message) => write!(f, "Upload failed: {message}"),
        }
    }
}

impl StdError for BackendError {}

/// The answering service, as seen by the session controller.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ask(&self, message: &str) -> Result<ChatReply, BackendError>;

    /// Sends a document to the service's index. Upload results never touch
    /// the conversation.
    async fn upload(&self, path: &Path) -> Result<UploadResponse, BackendError>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for std::sync::Arc<T> {
    async fn ask(&self, message: &str) -> Result<ChatReply, BackendError> {
        (**self).ask(message).await
    }

    async fn upload(&self, path: &Path) -> Result<UploadResponse, BackendError> {
        (**self).upload(path).await
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    chat_url: String,
    upload_url: String,
}

impl HttpBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        chat_endpoint: &str,
        upload_endpoint: &str,
    ) -> Self {
        Self {
            client,
            chat_url: resolve_endpoint(base_url, chat_endpoint),
            upload_url: resolve_endpoint(base_url, upload_endpoint),
        }
    }

    /// Builds a client with an optional overall request timeout.
    pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ask(&self, message: &str) -> Result<ChatReply, BackendError> {
        debug!(url = %self.chat_url, "sending chat request");
        let response = self
            .client
            .post(&self.chat_url)
            .header("Content-Type", "application/json")
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let value = read_json_body(response).await?;
        let response: ChatResponse =
            serde_json::from_value(value).map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(ChatReply::from(response))
    }

    /// Posts the file as `multipart/form-data` under the `file` field.
    async fn upload(&self, path: &Path) -> Result<UploadResponse, BackendError> {
        let file_name = validate_upload_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| BackendError::File(format!("{}: {err}", path.display())))?;

        debug!(
            url = %self.upload_url,
            file = %file_name,
            bytes = bytes.len(),
            "uploading document"
        );
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let value = read_json_body(response).await?;
        serde_json::from_value(value).map_err(|err| BackendError::Decode(err.to_string()))
    }
}

/// Accepts only the document types the indexer understands and returns the
/// file name to send.
pub fn validate_upload_path(path: &Path) -> Result<String, BackendError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BackendError::File("No file uploaded".to_string()))?;

    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            UPLOAD_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false);

    if supported {
        Ok(file_name)
    } else {
        Err(BackendError::Rejected("Unsupported file type.".to_string()))
    }
}

async fn read_json_body(response: reqwest::Response) -> Result<Value, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| BackendError::Transport(err.to_string()))?;
    let parsed = serde_json::from_str::<Value>(body.trim());

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|value| extract_error_summary(&value))
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| fallback_error_text(status.as_u16(), &body));
        return Err(BackendError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let value = parsed.map_err(|err| BackendError::Decode(err.to_string()))?;
    if let Some(message) = value.get("error").and_then(error_text) {
        return Err(BackendError::Rejected(message));
    }
    Ok(value)
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(collapse_whitespace(text)),
        Value::Object(map) => map
            .get("message")
            .and_then(|message| message.as_str())
            .map(collapse_whitespace),
        _ => None,
    }
}

fn extract_error_summary(value: &Value) -> Option<String> {
    value.get("error").and_then(error_text).or_else(|| {
        value
            .get("message")
            .and_then(|message| message.as_str())
            .map(collapse_whitespace)
    })
}

fn fallback_error_text(status: u16, body: &str) -> String {
    let trimmed = collapse_whitespace(body);
    if trimmed.is_empty() {
        format!("Server returned status {status}")
    } else {
        format!("status {status}: {trimmed}")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
