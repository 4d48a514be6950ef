use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::io::ConfigError;
use crate::core::history::DEFAULT_HISTORY_KEY;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_CHAT_ENDPOINT: &str = "chat";
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "upload";

/// Keys accepted by `docchat set` / `docchat unset`, in display order.
pub const CONFIG_KEYS: &[&str] = &[
    "backend-url",
    "chat-endpoint",
    "upload-endpoint",
    "history-key",
    "data-dir",
    "request-timeout-secs",
    "sources-used-only",
    "bell",
    "log-file",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the document chat service
    pub backend_url: Option<String>,
    /// Path (or absolute URL) of the chat endpoint
    pub chat_endpoint: Option<String>,
    /// Path (or absolute URL) of the upload endpoint
    pub upload_endpoint: Option<String>,
    /// Storage key the conversation is persisted under
    pub history_key: Option<String>,
    /// Directory holding persisted conversations
    pub data_dir: Option<PathBuf>,
    /// Per-request timeout; unset or 0 leaves the transport default
    pub request_timeout_secs: Option<u64>,
    /// Show only sources used this session in the sources view
    pub sources_used_only: Option<bool>,
    /// Ring the terminal bell on submit and receive
    pub bell: Option<bool>,
    /// Transcript log file opened at startup
    pub log_file: Option<String>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn backend_url(&self) -> &str {
        non_empty(&self.backend_url).unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn chat_endpoint(&self) -> &str {
        non_empty(&self.chat_endpoint).unwrap_or(DEFAULT_CHAT_ENDPOINT)
    }

    pub fn upload_endpoint(&self) -> &str {
        non_empty(&self.upload_endpoint).unwrap_or(DEFAULT_UPLOAD_ENDPOINT)
    }

    pub fn history_key(&self) -> &str {
        non_empty(&self.history_key).unwrap_or(DEFAULT_HISTORY_KEY)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn sources_used_only(&self) -> bool {
        self.sources_used_only.unwrap_or(false)
    }

    pub fn bell(&self) -> bool {
        self.bell.unwrap_or(false)
    }

    /// Configured data directory, or the platform data directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_dir(),
        }
    }

    /// Applies a `set <key> <value>` request.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        if value.is_empty() {
            return Err(invalid());
        }

        match key {
            "backend-url" => self.backend_url = Some(value.to_string()),
            "chat-endpoint" => self.chat_endpoint = Some(value.to_string()),
            "upload-endpoint" => self.upload_endpoint = Some(value.to_string()),
            "history-key" => self.history_key = Some(value.to_string()),
            "data-dir" => self.data_dir = Some(PathBuf::from(value)),
            "request-timeout-secs" => {
                self.request_timeout_secs = Some(value.parse().map_err(|_| invalid())?)
            }
            "sources-used-only" => {
                self.sources_used_only = Some(parse_flag(value).ok_or_else(invalid)?)
            }
            "bell" => self.bell = Some(parse_flag(value).ok_or_else(invalid)?),
            "log-file" => self.log_file = Some(value.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "backend-url" => self.backend_url = None,
            "chat-endpoint" => self.chat_endpoint = None,
            "upload-endpoint" => self.upload_endpoint = None,
            "history-key" => self.history_key = None,
            "data-dir" => self.data_dir = None,
            "request-timeout-secs" => self.request_timeout_secs = None,
            "sources-used-only" => self.sources_used_only = None,
            "bell" => self.bell = None,
            "log-file" => self.log_file = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// `(key, value)` pairs for display; unset keys read `(unset)`.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let show = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());
        CONFIG_KEYS
            .iter()
            .map(|key| {
                let value = match *key {
                    "backend-url" => show(self.backend_url.clone()),
                    "chat-endpoint" => show(self.chat_endpoint.clone()),
                    "upload-endpoint" => show(self.upload_endpoint.clone()),
                    "history-key" => show(self.history_key.clone()),
                    "data-dir" => show(self.data_dir.as_ref().map(path_display)),
                    "request-timeout-secs" => {
                        show(self.request_timeout_secs.map(|secs| secs.to_string()))
                    }
                    "sources-used-only" => show(self.sources_used_only.map(on_off)),
                    "bell" => show(self.bell.map(on_off)),
                    _ => show(self.log_file.clone()),
                };
                (*key, value)
            })
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn on_off(flag: bool) -> String {
    if flag { "on" } else { "off" }.to_string()
}
