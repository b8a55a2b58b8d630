//! Lenient decoding of backend replies
//!
//! The backend may answer with an object or with a string that holds JSON
//! text. Anything that cannot be read as the expected shape decodes to the
//! reply's `Default`, which reads as a rejection with no message, so callers
//! fall back to their generic error text.

use crate::download::media::MediaInfo;
use crate::download::task::TaskId;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Unwrap a JSON-in-a-string payload; other values pass through
pub fn normalize(raw: Value) -> Value {
    match raw {
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(text),
        },
        other => other,
    }
}

pub trait WireReply: DeserializeOwned + Default {
    fn from_wire(raw: Value) -> Self {
        let value = normalize(raw);
        tracing::trace!("Backend reply: {}", value);
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("Unreadable backend reply: {}", e);
            Self::default()
        })
    }
}

/// Reply to single-task operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl WireReply for ActionReply {}

impl ActionReply {
    /// Backend error text, or `fallback` when it gave none
    pub fn error_or(&self, fallback: &str) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchTask {
    pub task_id: TaskId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub tasks: Vec<BatchTask>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WireReply for BatchReply {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalyzeReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<MediaInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WireReply for AnalyzeReply {}
