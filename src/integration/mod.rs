//! Integration layer
//!
//! The coordinator routes messages to named handlers; the assistant builds a
//! coordinator from settings and adds memory and speech around it.

pub mod assistant;
pub mod config;
pub mod coordinator;
pub mod handler;

pub use assistant::{
    Assistant, ChatTurn, ECHO_HANDLER, LLM_HANDLER, SPEECH_HANDLER,
};
pub use config::{EmbeddingBackend, MemorySettings, Settings};
pub use coordinator::{Coordinator, CoordinatorMetrics, Dispatch};
pub use handler::{handler_fn, EchoHandler, FnHandler, Handler};
