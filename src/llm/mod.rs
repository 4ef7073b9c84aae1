//! Hosted LLM access
//!
//! This module provides:
//! - Vertex AI Gemini configuration
//! - Streaming generation over server-sent events
//! - The coordinator handler that answers user prompts

pub mod config;
pub mod handler;
pub mod inference;
pub mod sse;

pub use config::LLMConfig;
pub use handler::LlmHandler;
pub use inference::{GenerateRequest, LlmClient, TokenCallback, VertexClient};
