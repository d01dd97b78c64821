//! ComfyUI HTTP API types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub system: Value,
    #[serde(default)]
    pub devices: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PromptRequest<'a> {
    pub prompt: &'a Value,
    pub client_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PromptResponse {
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node_errors: Value,
    #[serde(default)]
    pub error: Value,
}

impl PromptResponse {
    /// Non-empty `node_errors` or an `error` payload means the prompt was rejected.
    pub fn rejection(&self) -> Option<String> {
        let node_errors = match &self.node_errors {
            Value::Object(m) if !m.is_empty() => Some(self.node_errors.to_string()),
            _ => None,
        };
        let error = match &self.error {
            Value::Null => None,
            Value::Object(m) if m.is_empty() => None,
            Value::Object(m) => Some(
                m.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.error.to_string()),
            ),
            other => Some(other.to_string()),
        };
        match (error, node_errors) {
            (None, None) => None,
            (Some(e), None) => Some(e),
            (None, Some(n)) => Some(n),
            (Some(e), Some(n)) => Some(format!("{e}: {n}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

impl UploadResponse {
    /// Name to reference from a `LoadImage` node.
    pub fn reference(&self) -> String {
        if self.subfolder.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.subfolder, self.name)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptStatus {
    #[serde(default)]
    pub status_str: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub messages: Vec<Value>,
}

impl PromptStatus {
    pub fn is_error(&self) -> bool {
        self.status_str == "error"
    }

    /// Best-effort error text from `execution_error` messages.
    pub fn error_message(&self) -> String {
        self.messages
            .iter()
            .filter_map(Value::as_array)
            .filter(|m| m.first().and_then(Value::as_str) == Some("execution_error"))
            .filter_map(|m| m.get(1))
            .filter_map(|data| data.get("exception_message").and_then(Value::as_str))
            .map(str::trim)
            .next()
            .unwrap_or("execution error")
            .to_string()
    }
}

/// A file written by an output node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default = "default_output_type", rename = "type")]
    pub kind: String,
}

fn default_output_type() -> String {
    "output".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// node id -> output lists (`images`, `gifs`, `videos`, ...)
    #[serde(default)]
    pub outputs: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    pub status: Option<PromptStatus>,
}

impl HistoryEntry {
    pub fn is_error(&self) -> bool {
        self.status.as_ref().map(PromptStatus::is_error).unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        match &self.status {
            Some(status) => status.completed || status.status_str == "success",
            None => !self.outputs.is_empty(),
        }
    }

    /// Every file listed by any output node, excluding temp previews.
    pub fn output_files(&self) -> Vec<OutputFile> {
        let mut files = Vec::new();
        for lists in self.outputs.values() {
            for value in lists.values() {
                let Some(items) = value.as_array() else {
                    continue;
                };
                for item in items {
                    if let Ok(file) = serde_json::from_value::<OutputFile>(item.clone()) {
                        if file.kind != "temp" && !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
            }
        }
        files
    }
}
