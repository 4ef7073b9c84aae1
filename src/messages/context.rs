use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known context keys shared between callers and handlers.
pub mod keys {
    /// System prompt read by the LLM handler
    pub const SYSTEM_INSTRUCTION: &str = "system_instruction";
    pub const USER_ID: &str = "user_id";
    pub const SESSION_ID: &str = "session_id";
}

/// Shared key/value blackboard that lives as long as the coordinator.
///
/// Cloning yields another handle to the same map. Every read returns a copy,
/// so a handler never observes a half-applied write, but two reads of the same
/// key may see different values when other handlers write in between.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// String value under `key`; `None` when absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let ctx = Context::new();
        ctx.set("user_id", 123);
        assert_eq!(ctx.get("user_id"), Some(json!(123)));
        assert_eq!(ctx.get_or("missing", json!("default")), json!("default"));
    }

    #[test]
    fn test_last_writer_wins() {
        let ctx = Context::new();
        ctx.set(keys::SYSTEM_INSTRUCTION, "first");
        ctx.set(keys::SYSTEM_INSTRUCTION, "second");
        assert_eq!(ctx.get_str(keys::SYSTEM_INSTRUCTION).as_deref(), Some("second"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_get_str_ignores_non_strings() {
        let ctx = Context::new();
        ctx.set("n", 5);
        assert!(ctx.get_str("n").is_none());
        assert!(ctx.contains("n"));
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = Context::new();
        let other = ctx.clone();
        other.set("k", "v");
        assert_eq!(ctx.get_str("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_concurrent_writers() {
        let ctx = Context::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctx = ctx.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        ctx.set(format!("t{}-{}", i, j), j);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ctx.len(), 800);
        assert_eq!(ctx.snapshot().get("t7-99"), Some(&json!(99)));
    }
}
