//! The dispatch contract every routable component implements.

use crate::messages::{Context, Message};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A component the coordinator can route messages to.
///
/// Implementations may read and write the shared context. Work that should
/// outlive the call (audio playback, fire-and-forget uploads) must be spawned
/// by the handler itself; `handle` returns once the handler's own part is done.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message, context: &Context) -> Result<Value>;
}

/// Handler backed by a plain synchronous closure.
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Message, &Context) -> Result<Value> + Send + Sync,
{
    async fn handle(&self, message: &Message, context: &Context) -> Result<Value> {
        (self.f)(message, context)
    }
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Message, &Context) -> Result<Value> + Send + Sync,
{
    FnHandler { f }
}

/// Replies with the message content prefixed by a fixed label.
///
/// Registered as `echo`; useful as a liveness probe for callers that have no
/// hosted credentials.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    prefix: String,
}

impl EchoHandler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EchoHandler {
    fn default() -> Self {
        Self::new("echo:")
    }
}

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, message: &Message, _context: &Context) -> Result<Value> {
        tracing::debug!(kind = ?message.kind, "Echo handler received message");
        Ok(Value::String(format!("{}{}", self.prefix, message.content_text())))
    }
}
