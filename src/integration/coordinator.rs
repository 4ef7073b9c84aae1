//! Coordinator: named handler registry, shared context and failure-isolated routing
//!
//! Callers build a [`Message`], call [`Coordinator::route`] and get back either
//! the handler's value or `None`. Nothing a handler does, returning an error or
//! panicking, propagates past `route`.

use crate::integration::handler::Handler;
use crate::messages::{Context, Message};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of a single dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The handler returned a value
    Handled(Value),

    /// No target on the message, or no handler under that name
    NotFound,

    /// The handler returned an error or panicked
    Failed(String),
}

impl Dispatch {
    /// Collapse into the sentinel form: `Some(value)` or `None`.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Dispatch::Handled(value) => Some(value),
            Dispatch::NotFound | Dispatch::Failed(_) => None,
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, Dispatch::Handled(_))
    }
}

/// Coordinator counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    pub registered_handlers: usize,
    pub routed: u64,
    pub handled: u64,
    pub not_found: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    routed: AtomicU64,
    handled: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
}

/// In-process message router
///
/// Share it as `Arc<Coordinator>`; every method takes `&self`.
pub struct Coordinator {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    context: Context,
    counters: Counters,
}

impl Coordinator {
    /// Create a coordinator with no handlers and an empty context
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            context: Context::new(),
            counters: Counters::default(),
        }
    }

    /// Bind `name` to `handler`, replacing any previous binding
    pub fn register<H>(&self, name: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        self.register_arc(name, Arc::new(handler));
    }

    /// Bind `name` to an already shared handler
    pub fn register_arc(&self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        let name = name.into();
        if name.is_empty() {
            warn!("Registering handler under an empty name");
        }

        let previous = self.handlers.write().insert(name.clone(), handler);
        if previous.is_some() {
            info!(handler = %name, "Handler '{}' re-registered, previous binding replaced", name);
        } else {
            info!(handler = %name, "Handler '{}' registered", name);
        }
    }

    /// Current binding for `name`
    pub fn handler(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(name).cloned()
    }

    /// Registered handler names, sorted
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Route a message and return the handler's value, or `None` when the
    /// target is unknown or the handler failed.
    pub async fn route(&self, message: &Message) -> Option<Value> {
        self.dispatch(message).await.into_value()
    }

    /// Route a message and report exactly what happened.
    pub async fn dispatch(&self, message: &Message) -> Dispatch {
        self.counters.routed.fetch_add(1, Ordering::Relaxed);

        let Some(target) = message.target() else {
            warn!("Message has no target handler");
            self.counters.not_found.fetch_add(1, Ordering::Relaxed);
            return Dispatch::NotFound;
        };

        // Clone the handle out so the registry lock is released before awaiting
        let Some(handler) = self.handler(target) else {
            warn!(handler = %target, "Handler '{}' not found", target);
            self.counters.not_found.fetch_add(1, Ordering::Relaxed);
            return Dispatch::NotFound;
        };

        debug!(handler = %target, kind = ?message.kind, "Dispatching message");

        let outcome = AssertUnwindSafe(handler.handle(message, &self.context))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                self.counters.handled.fetch_add(1, Ordering::Relaxed);
                Dispatch::Handled(value)
            }
            Ok(Err(e)) => {
                error!(handler = %target, error = %e, "Error in handler '{}': {}", target, e);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Dispatch::Failed(e.to_string())
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(handler = %target, error = %reason, "Handler '{}' panicked: {}", target, reason);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Dispatch::Failed(reason)
            }
        }
    }

    /// Shared context handle
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn set_context(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.set(key, value);
    }

    pub fn get_context(&self, key: &str, default: Value) -> Value {
        self.context.get_or(key, default)
    }

    /// Live lookup in the process environment.
    pub fn load_config(&self, key: &str, default: Option<&str>) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| default.map(str::to_string))
    }

    pub fn metrics(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            registered_handlers: self.handlers.read().len(),
            routed: self.counters.routed.load(Ordering::Relaxed),
            handled: self.counters.handled.load(Ordering::Relaxed),
            not_found: self.counters.not_found.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
