use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of work routed through the coordinator.
///
/// Only `target` is interpreted by the coordinator. `kind`, `content` and any
/// extra fields belong to the receiving handler and pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the destination handler
    #[serde(default, alias = "target_module", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Optional purpose tag a handler may branch on
    #[serde(default, alias = "message_type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Handler-defined payload
    #[serde(default)]
    pub content: Value,

    /// Handler-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(target: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            target: Some(target.into()),
            kind: None,
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// A message with no destination; routing it always misses.
    pub fn untargeted(content: impl Into<Value>) -> Self {
        Self {
            target: None,
            kind: None,
            content: content.into(),
            extra: Map::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Content as text: strings verbatim, null as empty, anything else as JSON.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
